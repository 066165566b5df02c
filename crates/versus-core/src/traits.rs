//! Trait interfaces between the engine and its aggregate store.
//!
//! - [`ActivityStore`]: read-only aggregates for the discovery and search
//!   surfaces. Counting happens inside the store.
//! - [`Transaction`]: reads and appends inside one atomic write unit.
//! - [`EngineStore`]: opens write units and exposes per-user ledgers.
//!
//! The reference implementation lives in `versus-engine` (`MemoryStore`).

use chrono::{DateTime, Utc};

use crate::config::ConsensusConfig;
use crate::error::VersusError;
use crate::spoiler::ItemScope;
use crate::types::{
    Badge, Comment, CommentId, ComparisonActivity, ComparisonKey, ComparisonRef,
    ComparisonTotals, ComparisonVote, ContentItem, ItemId, ItemStats, Notification,
    ReputationEvent, SearchCandidate, UserCounters, UserId, Vote, VoteChange, VoteTally, WorkId, WorkRef,
};

/// Read-only aggregate queries.
///
/// Implementations compute counts with grouped queries rather than handing
/// raw rows to the engine. Readers must never block writers; slightly stale
/// aggregates are acceptable.
pub trait ActivityStore: Send + Sync {
    /// Comparisons with at least one in-scope live diff updated at or after
    /// `since`, with diffs and votes created since then counted separately.
    fn comparison_activity(
        &self,
        since: DateTime<Utc>,
        scope: &ItemScope,
    ) -> Result<Vec<ComparisonActivity>, VersusError>;

    /// All-time totals for every comparison with an in-scope live diff.
    fn comparison_totals(&self, scope: &ItemScope) -> Result<Vec<ComparisonTotals>, VersusError>;

    /// Per-diff tallies and live comment counts for in-scope live diffs.
    fn item_stats(&self, scope: &ItemScope) -> Result<Vec<ItemStats>, VersusError>;

    /// Every searchable work.
    fn search_candidates(&self) -> Result<Vec<SearchCandidate>, VersusError>;

    /// Every book-vs-adaptation vote recorded for a comparison.
    fn comparison_votes(&self, key: &ComparisonKey) -> Result<Vec<ComparisonVote>, VersusError>;

    /// Resolve a comparison from the two work slugs.
    fn comparison_by_slugs(
        &self,
        source_slug: &str,
        adaptation_slug: &str,
    ) -> Result<Option<ComparisonRef>, VersusError>;
}

/// Reads and writes inside one atomic write unit.
///
/// Every write is visible to later reads in the same transaction. Nothing is
/// visible to other callers until the enclosing
/// [`EngineStore::transaction`] returns `Ok`.
pub trait Transaction {
    fn work(&self, id: WorkId) -> Result<Option<WorkRef>, VersusError>;

    fn content_item(&self, id: ItemId) -> Result<Option<ContentItem>, VersusError>;

    fn comment(&self, id: CommentId) -> Result<Option<Comment>, VersusError>;

    /// Live vote tally of a diff.
    fn vote_tally(&self, item: ItemId) -> Result<VoteTally, VersusError>;

    /// Activity counters for a user, recomputed at call time.
    ///
    /// `consensus` defines which authored diffs count as high-accuracy.
    fn user_counters(
        &self,
        user: UserId,
        consensus: &ConsensusConfig,
    ) -> Result<UserCounters, VersusError>;

    fn insert_item(&mut self, item: ContentItem) -> Result<(), VersusError>;

    /// Insert, replace, or (identical value) retract the voter's vote.
    fn upsert_vote(&mut self, vote: Vote) -> Result<VoteChange, VersusError>;

    fn insert_comment(&mut self, comment: Comment) -> Result<(), VersusError>;

    /// Mark a comment helpful. Returns `false` when it already was.
    fn set_comment_helpful(&mut self, id: CommentId) -> Result<bool, VersusError>;

    fn upsert_comparison_vote(&mut self, vote: ComparisonVote) -> Result<(), VersusError>;

    fn append_reputation_event(&mut self, event: ReputationEvent) -> Result<(), VersusError>;

    /// Atomically add `delta` to the user's running total and return the new
    /// total. Never implemented as a caller-side read-then-write.
    fn increment_reputation(&mut self, user: UserId, delta: i64) -> Result<i64, VersusError>;

    /// Insert the badge unless the user already holds one of the same kind.
    /// Returns whether the badge was inserted.
    fn insert_badge_if_absent(&mut self, badge: Badge) -> Result<bool, VersusError>;

    fn insert_notification(&mut self, notification: Notification) -> Result<(), VersusError>;
}

/// A store the engine can write to.
pub trait EngineStore: ActivityStore {
    /// Run `f` as one atomic unit: all of its writes commit, or none do.
    fn transaction<T, F>(&self, f: F) -> Result<T, VersusError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, VersusError>;

    fn reputation_total(&self, user: UserId) -> Result<i64, VersusError>;

    fn reputation_events(&self, user: UserId) -> Result<Vec<ReputationEvent>, VersusError>;

    fn badges(&self, user: UserId) -> Result<Vec<Badge>, VersusError>;

    fn notifications(&self, user: UserId) -> Result<Vec<Notification>, VersusError>;
}
