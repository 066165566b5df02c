//! Write-path orchestration and read-path entry points.
//!
//! Every write runs inside exactly one [`EngineStore::transaction`]: the
//! triggering row, its reputation events, badges and notifications commit
//! together or not at all.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use versus_core::comparison::{self, PreferenceSummary};
use versus_core::config::EngineConfig;
use versus_core::error::{ActionError, StoreError, VersusError};
use versus_core::spoiler::SpoilerLevel;
use versus_core::traits::{ActivityStore, EngineStore, Transaction};
use versus_core::types::{
    Badge, Comment, CommentId, CommentStatus, ComparisonKey, ComparisonRef, ComparisonVote,
    ContentItem, DiffCategory, EventLink, ItemId, ItemStatus, Preference, ReputationEvent,
    ReputationEventKind, UserId, Vote, VoteChange, VoteTally, VoteValue,
};
use versus_discovery::Discovery;
use versus_reputation::consensus::{agree_percent, ConsensusEngine, ConsensusOutcome};
use versus_reputation::notify::{self, Notifier};
use versus_reputation::{system_clock, BadgeEngine, Clock, ReputationLedger};
use versus_search::{RelevanceMatcher, SearchHit};

// ---------------------------------------------------------------------------
// Requests and receipts
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewDiff {
    pub comparison: ComparisonKey,
    pub author: UserId,
    pub title: String,
    pub body: String,
    pub category: DiffCategory,
    #[serde(default)]
    pub spoiler: SpoilerLevel,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewComment {
    pub item: ItemId,
    pub author: UserId,
    #[serde(default)]
    pub parent: Option<CommentId>,
    pub body: String,
    #[serde(default)]
    pub spoiler: SpoilerLevel,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewComparisonVote {
    pub comparison: ComparisonKey,
    pub voter: UserId,
    pub preference: Preference,
    #[serde(default)]
    pub faithfulness: Option<u8>,
    pub read_source: bool,
    pub watched_adaptation: bool,
}

/// What a vote changed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoteReceipt {
    pub change: VoteChange,
    /// Tally after the change.
    pub tally: VoteTally,
    /// Set when this vote moved the tally across the consensus gate.
    pub consensus: Option<ConsensusOutcome>,
    /// Events written by this vote, for voter and author.
    pub events: Vec<ReputationEvent>,
    /// Badges newly awarded to voter or author.
    pub badges: Vec<Badge>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine<S: EngineStore + 'static> {
    store: Arc<S>,
    config: EngineConfig,
    clock: Clock,
    consensus: ConsensusEngine,
    ledger: ReputationLedger,
    badges: BadgeEngine,
    notifier: Notifier,
    matcher: RelevanceMatcher,
}

impl<S: EngineStore + 'static> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: EngineStore + 'static> Engine<S> {
    /// Create an engine over `store` using the system clock.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, VersusError> {
        Self::with_clock(store, config, system_clock())
    }

    /// Create an engine with a custom clock for testing.
    pub fn with_clock(store: Arc<S>, config: EngineConfig, clock: Clock) -> Result<Self, VersusError> {
        config.validate()?;
        let notifier = Notifier::new(clock.clone());
        Ok(Self {
            consensus: ConsensusEngine::new(config.consensus),
            ledger: ReputationLedger::new(config.reputation.clone(), notifier.clone(), clock.clone()),
            badges: BadgeEngine::new(config.consensus, notifier.clone(), clock.clone()),
            matcher: RelevanceMatcher::new(config.search.clone()),
            notifier,
            store,
            config,
            clock,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Write paths
    // -----------------------------------------------------------------------

    /// Record a new diff and award its author.
    pub fn create_diff(&self, new: NewDiff) -> Result<ContentItem, VersusError> {
        if new.comparison.source == new.comparison.adaptation {
            return Err(ActionError::SameWork.into());
        }
        let now = (self.clock)();
        let item = ContentItem {
            id: ItemId::new(),
            comparison: new.comparison,
            author: new.author,
            title: new.title,
            body: new.body,
            category: new.category,
            spoiler: new.spoiler,
            status: ItemStatus::Live,
            created_at: now,
            updated_at: now,
        };

        self.store.transaction(|tx| {
            require_works(tx, &item.comparison)?;
            tx.insert_item(item.clone())?;
            self.ledger
                .award(tx, item.author, ReputationEventKind::DiffCreated, EventLink::item(item.id))?;
            self.badges.check_and_award(tx, item.author)?;
            Ok(())
        })?;
        info!(item = %item.id, comparison = %item.comparison, "engine: diff created");
        Ok(item)
    }

    /// Cast, change or retract (same value twice) a vote on a diff.
    ///
    /// When the change moves the tally across the minimum-votes gate the
    /// diff is classified and its author rewarded and notified.
    pub fn cast_vote(&self, item_id: ItemId, voter: UserId, value: VoteValue) -> Result<VoteReceipt, VersusError> {
        self.store.transaction(|tx| {
            let item = require_item(tx, item_id)?;
            if item.author == voter {
                return Err(ActionError::SelfVote.into());
            }
            if !item.status.is_live() {
                return Err(ActionError::NotLive(item_id.to_string()).into());
            }

            let before = tx.vote_tally(item_id)?;
            let change = tx.upsert_vote(Vote {
                item: item_id,
                voter,
                value,
                created_at: (self.clock)(),
            })?;
            let after = tx.vote_tally(item_id)?;

            let mut events = Vec::new();
            if matches!(change, VoteChange::Cast { .. }) {
                events.extend(self.ledger.award(tx, voter, ReputationEventKind::VoteCast, EventLink::item(item_id))?);
            }

            let mut badges = Vec::new();
            let mut consensus = None;
            if self.consensus.gate_crossed(&before, &after) {
                let outcome = self.consensus.classify(&after);
                let percent = agree_percent(&after);
                info!(item = %item_id, ?outcome, percent, "engine: consensus gate crossed");

                if let Some(kind) = outcome.reputation_kind() {
                    events.extend(self.ledger.award(tx, item.author, kind, EventLink::item(item_id))?);
                }
                if let Some(note) = notify::consensus(item.author, item_id, outcome, percent) {
                    self.notifier.create(tx, note)?;
                }
                badges.extend(self.badges.check_and_award(tx, item.author)?);
                consensus = Some(outcome);
            }

            badges.extend(self.badges.check_and_award(tx, voter)?);
            debug!(item = %item_id, %voter, ?change, total = after.total(), "engine: vote recorded");
            Ok(VoteReceipt {
                change,
                tally: after,
                consensus,
                events,
                badges,
            })
        })
    }

    /// Post a comment or a reply on a diff.
    pub fn post_comment(&self, new: NewComment) -> Result<Comment, VersusError> {
        self.store.transaction(|tx| {
            let item = require_item(tx, new.item)?;
            if !item.status.accepts_comments() {
                return Err(if item.status.is_live() {
                    ActionError::CommentsLocked(item.id.to_string())
                } else {
                    ActionError::NotLive(item.id.to_string())
                }
                .into());
            }

            let parent = match new.parent {
                Some(parent_id) => {
                    let parent = tx
                        .comment(parent_id)?
                        .ok_or_else(|| StoreError::CommentNotFound(parent_id.to_string()))?;
                    if parent.item != item.id {
                        return Err(ActionError::ParentMismatch {
                            parent: parent_id.to_string(),
                            item: item.id.to_string(),
                        }
                        .into());
                    }
                    Some(parent)
                }
                None => None,
            };

            let comment = Comment {
                id: CommentId::new(),
                item: item.id,
                author: new.author,
                parent: new.parent,
                body: new.body,
                spoiler: new.spoiler,
                status: CommentStatus::Live,
                helpful: false,
                created_at: (self.clock)(),
            };
            tx.insert_comment(comment.clone())?;
            let link = EventLink::comment(item.id, comment.id);
            self.ledger.award(tx, comment.author, ReputationEventKind::CommentPosted, link)?;

            if let Some(parent) = parent.filter(|p| p.author != comment.author) {
                self.notifier
                    .create(tx, notify::comment_reply(parent.author, item.id, comment.id))?;
                self.ledger.award(tx, parent.author, ReputationEventKind::CommentReply, link)?;
            }

            self.badges.check_and_award(tx, comment.author)?;
            Ok(comment)
        })
    }

    /// Mark a comment helpful. Only the diff's author may do this.
    ///
    /// Returns `false` when the comment was already marked.
    pub fn mark_helpful(&self, comment_id: CommentId, marker: UserId) -> Result<bool, VersusError> {
        self.store.transaction(|tx| {
            let comment = tx
                .comment(comment_id)?
                .ok_or_else(|| StoreError::CommentNotFound(comment_id.to_string()))?;
            let item = require_item(tx, comment.item)?;
            if item.author != marker {
                return Err(ActionError::NotDiffAuthor.into());
            }
            if !tx.set_comment_helpful(comment_id)? {
                debug!(comment = %comment_id, "engine: comment already helpful");
                return Ok(false);
            }

            let link = EventLink::comment(item.id, comment_id);
            self.ledger.award(tx, comment.author, ReputationEventKind::CommentHelpful, link)?;
            self.notifier
                .create(tx, notify::comment_helpful(comment.author, item.id, comment_id))?;
            self.badges.check_and_award(tx, comment.author)?;
            Ok(true)
        })
    }

    /// Record (or replace) a voter's book-vs-adaptation verdict.
    ///
    /// Reputation and badges only follow once both consumption boxes are
    /// ticked.
    pub fn cast_comparison_vote(&self, new: NewComparisonVote) -> Result<ComparisonVote, VersusError> {
        if let Some(rating) = new.faithfulness.filter(|r| !(1..=5).contains(r)) {
            return Err(ActionError::RatingOutOfRange(rating).into());
        }
        if new.comparison.source == new.comparison.adaptation {
            return Err(ActionError::SameWork.into());
        }
        let vote = ComparisonVote {
            comparison: new.comparison,
            voter: new.voter,
            preference: new.preference,
            faithfulness: new.faithfulness,
            read_source: new.read_source,
            watched_adaptation: new.watched_adaptation,
            created_at: (self.clock)(),
        };

        self.store.transaction(|tx| {
            require_works(tx, &vote.comparison)?;
            tx.upsert_comparison_vote(vote.clone())?;
            if vote.is_confirmed() {
                self.ledger
                    .award(tx, vote.voter, ReputationEventKind::ComparisonVoteCast, EventLink::default())?;
                self.badges.check_and_award(tx, vote.voter)?;
            }
            Ok(())
        })?;
        Ok(vote)
    }

    // -----------------------------------------------------------------------
    // Read paths
    // -----------------------------------------------------------------------

    /// Discovery surfaces over this engine's store.
    pub fn discovery(&self) -> Discovery {
        let store: Arc<dyn ActivityStore> = self.store.clone();
        let clock = self.clock.clone();
        Discovery::with_clock(store, self.config.scoring, self.config.discovery.clone(), move || clock())
    }

    /// Search works. A store failure is logged and served as no results.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        match self.store.search_candidates() {
            Ok(candidates) => self.matcher.rank(query, &candidates, limit),
            Err(e) => {
                warn!(error = %e, "engine: search candidates unavailable");
                Vec::new()
            }
        }
    }

    /// Preference counts over confirmed votes.
    pub fn comparison_stats(&self, key: &ComparisonKey) -> Result<PreferenceSummary, VersusError> {
        let votes = self.store.comparison_votes(key)?;
        Ok(comparison::summarize(&votes))
    }

    /// Resolve a comparison from its two work slugs.
    pub fn resolve_comparison(&self, source_slug: &str, adaptation_slug: &str) -> Result<Option<ComparisonRef>, VersusError> {
        self.store.comparison_by_slugs(source_slug, adaptation_slug)
    }
}

fn require_item(tx: &dyn Transaction, id: ItemId) -> Result<ContentItem, VersusError> {
    tx.content_item(id)?
        .ok_or_else(|| StoreError::ItemNotFound(id.to_string()).into())
}

fn require_works(tx: &dyn Transaction, key: &ComparisonKey) -> Result<(), VersusError> {
    for work in [key.source, key.adaptation] {
        if tx.work(work)?.is_none() {
            return Err(StoreError::WorkNotFound(work.to_string()).into());
        }
    }
    Ok(())
}
