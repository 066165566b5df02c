//! In-memory aggregate store.
//!
//! [`MemoryStore`] implements both store traits over plain maps behind a
//! single `parking_lot::RwLock`. Read aggregates take the read lock and run
//! concurrently. A write transaction holds the write lock for its whole
//! closure, applies each write in place and records how to revert it; on
//! error the undo log is replayed in reverse before the lock is released.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use versus_core::config::ConsensusConfig;
use versus_core::error::{StoreError, VersusError};
use versus_core::spoiler::ItemScope;
use versus_core::traits::{ActivityStore, EngineStore, Transaction};
use versus_core::types::{
    Badge, BadgeKind, Comment, CommentId, CommentStatus, ComparisonActivity, ComparisonKey,
    ComparisonRef, ComparisonTotals, ComparisonVote, ContentItem, ItemId, ItemStats, ItemStatus,
    Notification, ReputationEvent, SearchCandidate, UserCounters, UserId, Vote, VoteChange,
    VoteTally, WorkId, WorkRef,
};
use versus_reputation::consensus::{ConsensusEngine, ConsensusOutcome};

/// A work plus the secondary fields search reads.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WorkRecord {
    pub work: WorkRef,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// External popularity metric. Falls back to the related live diff count.
    #[serde(default)]
    pub popularity: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Seed data for a store, as loaded from a JSON file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Snapshot {
    pub works: Vec<WorkRecord>,
    pub items: Vec<ContentItem>,
    pub votes: Vec<Vote>,
    pub comments: Vec<Comment>,
    pub comparison_votes: Vec<ComparisonVote>,
}

/// Write primitive that can be made to fail, for rollback tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    InsertItem,
    UpsertVote,
    InsertComment,
    AppendEvent,
    IncrementReputation,
    InsertBadge,
    InsertNotification,
}

#[derive(Default)]
struct State {
    works: HashMap<WorkId, WorkRecord>,
    items: HashMap<ItemId, ContentItem>,
    votes: HashMap<(ItemId, UserId), Vote>,
    comments: HashMap<CommentId, Comment>,
    comparison_votes: HashMap<(ComparisonKey, UserId), ComparisonVote>,
    events: Vec<ReputationEvent>,
    totals: HashMap<UserId, i64>,
    badges: HashMap<(UserId, BadgeKind), Badge>,
    notifications: Vec<Notification>,
    fail_on: Option<FailPoint>,
    offline: bool,
}

impl State {
    fn comparison_ref(&self, key: &ComparisonKey) -> Option<ComparisonRef> {
        let source = self.works.get(&key.source)?;
        let adaptation = self.works.get(&key.adaptation)?;
        Some(ComparisonRef {
            source: source.work.clone(),
            adaptation: adaptation.work.clone(),
        })
    }

    fn tally(&self, item: ItemId) -> VoteTally {
        let mut tally = VoteTally::default();
        for ((voted, _), vote) in &self.votes {
            if *voted == item {
                tally.add(vote.value);
            }
        }
        tally
    }

    fn tallies(&self) -> HashMap<ItemId, VoteTally> {
        let mut tallies: HashMap<ItemId, VoteTally> = HashMap::new();
        for ((item, _), vote) in &self.votes {
            tallies.entry(*item).or_default().add(vote.value);
        }
        tallies
    }

    /// Live, in-scope diffs whose works are both known.
    fn visible<'a>(&'a self, scope: &'a ItemScope) -> impl Iterator<Item = &'a ContentItem> + 'a {
        self.items.values().filter(move |item| {
            item.status.is_live()
                && scope.includes(item.spoiler)
                && self.works.contains_key(&item.comparison.source)
                && self.works.contains_key(&item.comparison.adaptation)
        })
    }

    fn check_online(&self) -> Result<(), VersusError> {
        if self.offline {
            return Err(StoreError::Unavailable("store offline".into()).into());
        }
        Ok(())
    }
}

/// Reference [`EngineStore`] backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryStore")
            .field("works", &state.works.len())
            .field("items", &state.items.len())
            .field("votes", &state.votes.len())
            .field("events", &state.events.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed data. Rows referring to unknown works or
    /// diffs are rejected.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, VersusError> {
        let store = Self::new();
        {
            let mut state = store.state.write();
            for record in snapshot.works {
                state.works.insert(record.work.id, record);
            }
            for item in snapshot.items {
                for work in [item.comparison.source, item.comparison.adaptation] {
                    if !state.works.contains_key(&work) {
                        return Err(StoreError::WorkNotFound(work.to_string()).into());
                    }
                }
                if state.items.insert(item.id, item.clone()).is_some() {
                    return Err(StoreError::Duplicate(item.id.to_string()).into());
                }
            }
            for vote in snapshot.votes {
                if !state.items.contains_key(&vote.item) {
                    return Err(StoreError::ItemNotFound(vote.item.to_string()).into());
                }
                state.votes.insert((vote.item, vote.voter), vote);
            }
            for comment in snapshot.comments {
                if !state.items.contains_key(&comment.item) {
                    return Err(StoreError::ItemNotFound(comment.item.to_string()).into());
                }
                state.comments.insert(comment.id, comment);
            }
            for vote in snapshot.comparison_votes {
                state.comparison_votes.insert((vote.comparison, vote.voter), vote);
            }
            debug!(
                works = state.works.len(),
                items = state.items.len(),
                votes = state.votes.len(),
                "store: seeded from snapshot"
            );
        }
        Ok(store)
    }

    pub fn insert_work(&self, record: WorkRecord) {
        self.state.write().works.insert(record.work.id, record);
    }

    /// Moderation transition. Returns `false` for an unknown diff.
    pub fn set_item_status(&self, item: ItemId, status: ItemStatus) -> bool {
        match self.state.write().items.get_mut(&item) {
            Some(found) => {
                found.status = status;
                true
            }
            None => false,
        }
    }

    pub fn set_comment_status(&self, comment: CommentId, status: CommentStatus) -> bool {
        match self.state.write().comments.get_mut(&comment) {
            Some(found) => {
                found.status = status;
                true
            }
            None => false,
        }
    }

    /// Make the next write of kind `point` fail inside any transaction.
    #[cfg(any(test, feature = "testing"))]
    pub fn fail_on(&self, point: Option<FailPoint>) {
        self.state.write().fail_on = point;
    }

    /// Make every read aggregate fail with [`StoreError::Unavailable`].
    #[cfg(any(test, feature = "testing"))]
    pub fn set_offline(&self, offline: bool) {
        self.state.write().offline = offline;
    }
}

// ---------------------------------------------------------------------------
// Read aggregates
// ---------------------------------------------------------------------------

impl ActivityStore for MemoryStore {
    fn comparison_activity(
        &self,
        since: DateTime<Utc>,
        scope: &ItemScope,
    ) -> Result<Vec<ComparisonActivity>, VersusError> {
        let state = self.state.read();
        state.check_online()?;

        let mut recent_votes: HashMap<ItemId, u64> = HashMap::new();
        for ((item, _), vote) in &state.votes {
            if vote.created_at >= since {
                *recent_votes.entry(*item).or_default() += 1;
            }
        }

        struct Acc {
            recent_items: u64,
            recent_votes: u64,
            total_items: u64,
            last_updated: DateTime<Utc>,
        }
        let mut by_comparison: HashMap<ComparisonKey, Acc> = HashMap::new();
        for item in state.visible(scope) {
            let acc = by_comparison.entry(item.comparison).or_insert(Acc {
                recent_items: 0,
                recent_votes: 0,
                total_items: 0,
                last_updated: item.updated_at,
            });
            acc.total_items += 1;
            acc.last_updated = acc.last_updated.max(item.updated_at);
            // Only diffs updated inside the window contribute activity.
            if item.updated_at >= since {
                acc.recent_items += u64::from(item.created_at >= since);
                acc.recent_votes += recent_votes.get(&item.id).copied().unwrap_or(0);
            }
        }

        Ok(by_comparison
            .into_iter()
            .filter(|(_, acc)| acc.last_updated >= since)
            .filter_map(|(key, acc)| {
                Some(ComparisonActivity {
                    comparison: state.comparison_ref(&key)?,
                    recent_items: acc.recent_items,
                    recent_votes: acc.recent_votes,
                    total_items: acc.total_items,
                    last_updated: acc.last_updated,
                })
            })
            .collect())
    }

    fn comparison_totals(&self, scope: &ItemScope) -> Result<Vec<ComparisonTotals>, VersusError> {
        let state = self.state.read();
        state.check_online()?;
        let tallies = state.tallies();

        let mut by_comparison: HashMap<ComparisonKey, (u64, u64, DateTime<Utc>)> = HashMap::new();
        for item in state.visible(scope) {
            let votes = tallies.get(&item.id).map_or(0, VoteTally::total);
            let acc = by_comparison
                .entry(item.comparison)
                .or_insert((0, 0, item.updated_at));
            acc.0 += 1;
            acc.1 += votes;
            acc.2 = acc.2.max(item.updated_at);
        }

        Ok(by_comparison
            .into_iter()
            .filter_map(|(key, (items, votes, last_updated))| {
                Some(ComparisonTotals {
                    comparison: state.comparison_ref(&key)?,
                    total_items: items,
                    total_votes: votes,
                    last_updated,
                })
            })
            .collect())
    }

    fn item_stats(&self, scope: &ItemScope) -> Result<Vec<ItemStats>, VersusError> {
        let state = self.state.read();
        state.check_online()?;
        let tallies = state.tallies();

        let mut live_comments: HashMap<ItemId, u64> = HashMap::new();
        for comment in state.comments.values() {
            if comment.status == CommentStatus::Live {
                *live_comments.entry(comment.item).or_default() += 1;
            }
        }

        Ok(state
            .visible(scope)
            .filter_map(|item| {
                Some(ItemStats {
                    item: item.id,
                    comparison: state.comparison_ref(&item.comparison)?,
                    tally: tallies.get(&item.id).copied().unwrap_or_default(),
                    live_comments: live_comments.get(&item.id).copied().unwrap_or(0),
                    updated_at: item.updated_at,
                })
            })
            .collect())
    }

    fn search_candidates(&self) -> Result<Vec<SearchCandidate>, VersusError> {
        let state = self.state.read();
        state.check_online()?;

        let mut related: HashMap<WorkId, u64> = HashMap::new();
        for item in state.visible(&ItemScope::all()) {
            *related.entry(item.comparison.source).or_default() += 1;
            *related.entry(item.comparison.adaptation).or_default() += 1;
        }

        Ok(state
            .works
            .values()
            .map(|record| SearchCandidate {
                work: record.work.clone(),
                creator: record.creator.clone(),
                summary: record.summary.clone(),
                popularity: record
                    .popularity
                    .unwrap_or_else(|| related.get(&record.work.id).copied().unwrap_or(0) as f64),
                updated_at: record.updated_at,
            })
            .collect())
    }

    fn comparison_votes(&self, key: &ComparisonKey) -> Result<Vec<ComparisonVote>, VersusError> {
        let state = self.state.read();
        state.check_online()?;
        Ok(state
            .comparison_votes
            .values()
            .filter(|vote| vote.comparison == *key)
            .cloned()
            .collect())
    }

    fn comparison_by_slugs(
        &self,
        source_slug: &str,
        adaptation_slug: &str,
    ) -> Result<Option<ComparisonRef>, VersusError> {
        let state = self.state.read();
        state.check_online()?;
        let find = |slug: &str| {
            state
                .works
                .values()
                .find(|record| record.work.slug == slug)
                .map(|record| record.work.clone())
        };
        Ok(find(source_slug)
            .zip(find(adaptation_slug))
            .map(|(source, adaptation)| ComparisonRef { source, adaptation }))
    }
}

// ---------------------------------------------------------------------------
// Write transactions
// ---------------------------------------------------------------------------

/// How to revert one applied write.
enum Undo {
    RemoveItem(ItemId),
    RestoreVote((ItemId, UserId), Option<Vote>),
    RemoveComment(CommentId),
    ClearHelpful(CommentId),
    RestoreComparisonVote((ComparisonKey, UserId), Option<ComparisonVote>),
    PopEvent,
    RestoreTotal(UserId, Option<i64>),
    RemoveBadge((UserId, BadgeKind)),
    PopNotification,
}

struct MemoryTx<'a> {
    state: &'a mut State,
    undo: Vec<Undo>,
}

impl MemoryTx<'_> {
    fn inject(&self, point: FailPoint) -> Result<(), VersusError> {
        if self.state.fail_on == Some(point) {
            return Err(StoreError::Unavailable(format!("injected failure at {point:?}")).into());
        }
        Ok(())
    }

    /// Keep every write made so far.
    fn commit(&mut self) {
        self.undo.clear();
    }

    fn rollback(&mut self) {
        let steps = self.undo.len();
        for step in std::mem::take(&mut self.undo).into_iter().rev() {
            match step {
                Undo::RemoveItem(id) => {
                    self.state.items.remove(&id);
                }
                Undo::RestoreVote(key, previous) => match previous {
                    Some(vote) => {
                        self.state.votes.insert(key, vote);
                    }
                    None => {
                        self.state.votes.remove(&key);
                    }
                },
                Undo::RemoveComment(id) => {
                    self.state.comments.remove(&id);
                }
                Undo::ClearHelpful(id) => {
                    if let Some(comment) = self.state.comments.get_mut(&id) {
                        comment.helpful = false;
                    }
                }
                Undo::RestoreComparisonVote(key, previous) => match previous {
                    Some(vote) => {
                        self.state.comparison_votes.insert(key, vote);
                    }
                    None => {
                        self.state.comparison_votes.remove(&key);
                    }
                },
                Undo::PopEvent => {
                    self.state.events.pop();
                }
                Undo::RestoreTotal(user, previous) => match previous {
                    Some(total) => {
                        self.state.totals.insert(user, total);
                    }
                    None => {
                        self.state.totals.remove(&user);
                    }
                },
                Undo::RemoveBadge(key) => {
                    self.state.badges.remove(&key);
                }
                Undo::PopNotification => {
                    self.state.notifications.pop();
                }
            }
        }
        warn!(steps, "store: transaction rolled back");
    }
}

/// Uncommitted writes are undone on drop, so an error return or a panic in
/// the transaction body leaves the state as it was. Runs before the write
/// guard is released.
impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if !self.undo.is_empty() {
            self.rollback();
        }
    }
}

impl Transaction for MemoryTx<'_> {
    fn work(&self, id: WorkId) -> Result<Option<WorkRef>, VersusError> {
        Ok(self.state.works.get(&id).map(|record| record.work.clone()))
    }

    fn content_item(&self, id: ItemId) -> Result<Option<ContentItem>, VersusError> {
        Ok(self.state.items.get(&id).cloned())
    }

    fn comment(&self, id: CommentId) -> Result<Option<Comment>, VersusError> {
        Ok(self.state.comments.get(&id).cloned())
    }

    fn vote_tally(&self, item: ItemId) -> Result<VoteTally, VersusError> {
        Ok(self.state.tally(item))
    }

    fn user_counters(&self, user: UserId, consensus: &ConsensusConfig) -> Result<UserCounters, VersusError> {
        let classifier = ConsensusEngine::new(*consensus);
        let state = &*self.state;
        let authored = || state.items.values().filter(move |item| item.author == user);

        Ok(UserCounters {
            votes_cast: state.votes.keys().filter(|(_, voter)| *voter == user).count() as u64,
            comments_posted: state.comments.values().filter(|c| c.author == user).count() as u64,
            diffs_created: authored().count() as u64,
            comparison_votes: state
                .comparison_votes
                .values()
                .filter(|v| v.voter == user && v.is_confirmed())
                .count() as u64,
            helpful_comments: state
                .comments
                .values()
                .filter(|c| c.author == user && c.helpful)
                .count() as u64,
            high_accuracy_diffs: authored()
                .filter(|item| item.status.is_live())
                .filter(|item| classifier.classify(&state.tally(item.id)) == ConsensusOutcome::HighConsensus)
                .count() as u64,
        })
    }

    fn insert_item(&mut self, item: ContentItem) -> Result<(), VersusError> {
        self.inject(FailPoint::InsertItem)?;
        if self.state.items.contains_key(&item.id) {
            return Err(StoreError::Duplicate(item.id.to_string()).into());
        }
        self.undo.push(Undo::RemoveItem(item.id));
        self.state.items.insert(item.id, item);
        Ok(())
    }

    fn upsert_vote(&mut self, vote: Vote) -> Result<VoteChange, VersusError> {
        self.inject(FailPoint::UpsertVote)?;
        let key = (vote.item, vote.voter);
        let previous = self.state.votes.get(&key).cloned();
        let change = match &previous {
            None => VoteChange::Cast { value: vote.value },
            Some(old) if old.value == vote.value => VoteChange::Retracted { previous: old.value },
            Some(old) => VoteChange::Changed {
                from: old.value,
                to: vote.value,
            },
        };
        self.undo.push(Undo::RestoreVote(key, previous));
        match change {
            VoteChange::Retracted { .. } => {
                self.state.votes.remove(&key);
            }
            _ => {
                self.state.votes.insert(key, vote);
            }
        }
        Ok(change)
    }

    fn insert_comment(&mut self, comment: Comment) -> Result<(), VersusError> {
        self.inject(FailPoint::InsertComment)?;
        if self.state.comments.contains_key(&comment.id) {
            return Err(StoreError::Duplicate(comment.id.to_string()).into());
        }
        self.undo.push(Undo::RemoveComment(comment.id));
        self.state.comments.insert(comment.id, comment);
        Ok(())
    }

    fn set_comment_helpful(&mut self, id: CommentId) -> Result<bool, VersusError> {
        let comment = self
            .state
            .comments
            .get_mut(&id)
            .ok_or_else(|| StoreError::CommentNotFound(id.to_string()))?;
        if comment.helpful {
            return Ok(false);
        }
        comment.helpful = true;
        self.undo.push(Undo::ClearHelpful(id));
        Ok(true)
    }

    fn upsert_comparison_vote(&mut self, vote: ComparisonVote) -> Result<(), VersusError> {
        let key = (vote.comparison, vote.voter);
        let previous = self.state.comparison_votes.insert(key, vote);
        self.undo.push(Undo::RestoreComparisonVote(key, previous));
        Ok(())
    }

    fn append_reputation_event(&mut self, event: ReputationEvent) -> Result<(), VersusError> {
        self.inject(FailPoint::AppendEvent)?;
        self.state.events.push(event);
        self.undo.push(Undo::PopEvent);
        Ok(())
    }

    fn increment_reputation(&mut self, user: UserId, delta: i64) -> Result<i64, VersusError> {
        self.inject(FailPoint::IncrementReputation)?;
        let previous = self.state.totals.get(&user).copied();
        let total = previous.unwrap_or(0) + delta;
        self.state.totals.insert(user, total);
        self.undo.push(Undo::RestoreTotal(user, previous));
        Ok(total)
    }

    fn insert_badge_if_absent(&mut self, badge: Badge) -> Result<bool, VersusError> {
        self.inject(FailPoint::InsertBadge)?;
        let key = (badge.user, badge.kind);
        if self.state.badges.contains_key(&key) {
            return Ok(false);
        }
        self.state.badges.insert(key, badge);
        self.undo.push(Undo::RemoveBadge(key));
        Ok(true)
    }

    fn insert_notification(&mut self, notification: Notification) -> Result<(), VersusError> {
        self.inject(FailPoint::InsertNotification)?;
        self.state.notifications.push(notification);
        self.undo.push(Undo::PopNotification);
        Ok(())
    }
}

impl EngineStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, VersusError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, VersusError>,
    {
        let mut state = self.state.write();
        let mut tx = MemoryTx {
            state: &mut state,
            undo: Vec::new(),
        };
        let value = f(&mut tx)?;
        tx.commit();
        Ok(value)
    }

    fn reputation_total(&self, user: UserId) -> Result<i64, VersusError> {
        Ok(self.state.read().totals.get(&user).copied().unwrap_or(0))
    }

    fn reputation_events(&self, user: UserId) -> Result<Vec<ReputationEvent>, VersusError> {
        Ok(self
            .state
            .read()
            .events
            .iter()
            .filter(|event| event.user == user)
            .cloned()
            .collect())
    }

    fn badges(&self, user: UserId) -> Result<Vec<Badge>, VersusError> {
        let mut badges: Vec<Badge> = self
            .state
            .read()
            .badges
            .values()
            .filter(|badge| badge.user == user)
            .cloned()
            .collect();
        badges.sort_by_key(|badge| badge.kind);
        Ok(badges)
    }

    fn notifications(&self, user: UserId) -> Result<Vec<Notification>, VersusError> {
        Ok(self
            .state
            .read()
            .notifications
            .iter()
            .filter(|n| n.user == user)
            .cloned()
            .collect())
    }
}
