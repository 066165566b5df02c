//! Domain types: works, diffs, votes, comments, reputation records.
//!
//! Storage ownership lies with the aggregate store; the engine only reads
//! these records and appends new ones.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spoiler::SpoilerLevel;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Deterministic identifier built from a small integer. Handy for
            /// fixtures and seed data.
            pub fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// A registered user.
    UserId
);
define_id!(
    /// A book or a screen adaptation.
    WorkId
);
define_id!(
    /// A documented difference (diff) between a source work and its adaptation.
    ItemId
);
define_id!(CommentId);
define_id!(EventId);
define_id!(BadgeId);
define_id!(NotificationId);

// ---------------------------------------------------------------------------
// Works and comparisons
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Book,
    Screen,
}

/// Identifying fields of a work, as shown on result lists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WorkRef {
    pub id: WorkId,
    pub title: String,
    pub slug: String,
    pub kind: WorkKind,
}

/// A (source work, adaptation work) pair: the unit of grouping for most
/// ranking surfaces.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComparisonKey {
    pub source: WorkId,
    pub adaptation: WorkId,
}

impl ComparisonKey {
    pub fn new(source: WorkId, adaptation: WorkId) -> Self {
        Self { source, adaptation }
    }
}

impl fmt::Display for ComparisonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.adaptation)
    }
}

/// Both sides of a comparison with display fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ComparisonRef {
    pub source: WorkRef,
    pub adaptation: WorkRef,
}

impl ComparisonRef {
    pub fn key(&self) -> ComparisonKey {
        ComparisonKey::new(self.source.id, self.adaptation.id)
    }
}

// ---------------------------------------------------------------------------
// Diffs
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiffCategory {
    Plot,
    Character,
    Setting,
    Ending,
    Tone,
    Other,
}

/// Moderation lifecycle of a diff.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Live,
    Hidden,
    Locked,
    Pending,
    Rejected,
    Flagged,
}

impl ItemStatus {
    /// Publicly visible and counted by every aggregate. Locked diffs stay
    /// visible; they are only closed to new comments.
    pub fn is_live(self) -> bool {
        matches!(self, ItemStatus::Live | ItemStatus::Locked)
    }

    pub fn accepts_comments(self) -> bool {
        self == ItemStatus::Live
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContentItem {
    pub id: ItemId,
    pub comparison: ComparisonKey,
    pub author: UserId,
    pub title: String,
    pub body: String,
    pub category: DiffCategory,
    pub spoiler: SpoilerLevel,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// Per-diff vote value: agree, needs nuance, or disagree.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Accurate,
    NeedsNuance,
    Inaccurate,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub item: ItemId,
    pub voter: UserId,
    pub value: VoteValue,
    pub created_at: DateTime<Utc>,
}

/// Result of an upsert against the (diff, voter) vote slot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum VoteChange {
    /// No previous vote existed.
    Cast { value: VoteValue },
    /// A previous vote with a different value was replaced.
    Changed { from: VoteValue, to: VoteValue },
    /// The identical value was resubmitted and the vote was removed.
    Retracted { previous: VoteValue },
}

impl VoteChange {
    /// The vote left in place after the change, if any.
    pub fn current(&self) -> Option<VoteValue> {
        match *self {
            VoteChange::Cast { value } => Some(value),
            VoteChange::Changed { to, .. } => Some(to),
            VoteChange::Retracted { .. } => None,
        }
    }
}

/// Live vote counts for a single diff.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub accurate: u64,
    pub needs_nuance: u64,
    pub inaccurate: u64,
}

impl VoteTally {
    pub fn new(accurate: u64, needs_nuance: u64, inaccurate: u64) -> Self {
        Self {
            accurate,
            needs_nuance,
            inaccurate,
        }
    }

    pub fn total(&self) -> u64 {
        self.accurate + self.needs_nuance + self.inaccurate
    }

    /// Fraction of votes marked accurate. `0.0` when there are no votes.
    pub fn accurate_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.accurate as f64 / total as f64,
        }
    }

    pub fn add(&mut self, value: VoteValue) {
        *self.slot(value) += 1;
    }

    pub fn remove(&mut self, value: VoteValue) {
        let slot = self.slot(value);
        *slot = slot.saturating_sub(1);
    }

    fn slot(&mut self, value: VoteValue) -> &mut u64 {
        match value {
            VoteValue::Accurate => &mut self.accurate,
            VoteValue::NeedsNuance => &mut self.needs_nuance,
            VoteValue::Inaccurate => &mut self.inaccurate,
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison (book vs. adaptation) votes
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    Book,
    Screen,
    Tie,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ComparisonVote {
    pub comparison: ComparisonKey,
    pub voter: UserId,
    pub preference: Preference,
    /// Optional 1–5 rating of how faithful the adaptation is.
    pub faithfulness: Option<u8>,
    pub read_source: bool,
    pub watched_adaptation: bool,
    pub created_at: DateTime<Utc>,
}

impl ComparisonVote {
    /// Only voters who confirmed both the book and the adaptation count
    /// toward aggregate statistics.
    pub fn is_confirmed(&self) -> bool {
        self.read_source && self.watched_adaptation
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    #[default]
    Live,
    Hidden,
    Flagged,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub item: ItemId,
    pub author: UserId,
    pub parent: Option<CommentId>,
    pub body: String,
    pub spoiler: SpoilerLevel,
    pub status: CommentStatus,
    pub helpful: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reputation, badges, notifications
// ---------------------------------------------------------------------------

/// What earned (or cost) reputation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReputationEventKind {
    DiffCreated,
    DiffHighConsensus,
    DiffModerateConsensus,
    DiffRejected,
    VoteCast,
    ComparisonVoteCast,
    CommentPosted,
    CommentReply,
    CommentHelpful,
}

/// Optional links from a reputation event to the entity that triggered it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EventLink {
    pub item: Option<ItemId>,
    pub comment: Option<CommentId>,
}

impl EventLink {
    pub fn item(item: ItemId) -> Self {
        Self {
            item: Some(item),
            comment: None,
        }
    }

    pub fn comment(item: ItemId, comment: CommentId) -> Self {
        Self {
            item: Some(item),
            comment: Some(comment),
        }
    }
}

/// Immutable ledger entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReputationEvent {
    pub id: EventId,
    pub user: UserId,
    pub kind: ReputationEventKind,
    pub amount: i64,
    pub link: EventLink,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    FirstDiff,
    Documentarian,
    Archivist,
    FirstVote,
    Critic,
    Arbiter,
    FirstComment,
    Conversationalist,
    FirstVerdict,
    SharpEye,
    TrustedSource,
    Helpful,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Badge {
    pub id: BadgeId,
    pub user: UserId,
    pub kind: BadgeKind,
    pub metadata: serde_json::Value,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ReputationMilestone,
    BadgeEarned,
    ConsensusReached,
    DiffRejected,
    CommentReply,
    CommentHelpful,
}

/// A notification about to be written.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewNotification {
    pub user: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub item: Option<ItemId>,
    pub comment: Option<CommentId>,
    pub metadata: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub user: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub item: Option<ItemId>,
    pub comment: Option<CommentId>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Per-user activity counters, recomputed by the store at call time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct UserCounters {
    pub votes_cast: u64,
    pub comments_posted: u64,
    pub diffs_created: u64,
    pub comparison_votes: u64,
    pub helpful_comments: u64,
    /// Authored live diffs whose tally sits in the high-consensus band.
    pub high_accuracy_diffs: u64,
}

// ---------------------------------------------------------------------------
// Aggregates consumed by the read path
// ---------------------------------------------------------------------------

/// Windowed activity for one comparison.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ComparisonActivity {
    pub comparison: ComparisonRef,
    /// Live diffs created inside the window.
    pub recent_items: u64,
    /// Votes cast inside the window on live diffs.
    pub recent_votes: u64,
    /// All-time live diff count.
    pub total_items: u64,
    pub last_updated: DateTime<Utc>,
}

/// All-time totals for one comparison with at least one live diff.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ComparisonTotals {
    pub comparison: ComparisonRef,
    pub total_items: u64,
    pub total_votes: u64,
    pub last_updated: DateTime<Utc>,
}

/// Per-diff aggregate used by the "needs help" pass.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemStats {
    pub item: ItemId,
    pub comparison: ComparisonRef,
    pub tally: VoteTally,
    pub live_comments: u64,
    pub updated_at: DateTime<Utc>,
}

/// A searchable work with its secondary text fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SearchCandidate {
    pub work: WorkRef,
    /// Author or director.
    pub creator: Option<String>,
    pub summary: Option<String>,
    /// Related-diff count or an external popularity metric.
    pub popularity: f64,
    pub updated_at: DateTime<Utc>,
}
