//! Error types for the Versus engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("diff not found: {0}")] ItemNotFound(String),
    #[error("comment not found: {0}")] CommentNotFound(String),
    #[error("work not found: {0}")] WorkNotFound(String),
    #[error("duplicate id: {0}")] Duplicate(String),
    #[error("store unavailable: {0}")] Unavailable(String),
    #[error("internal: {0}")] Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("cannot vote on your own diff")] SelfVote,
    #[error("diff {0} is not open for this action")] NotLive(String),
    #[error("comments are locked on diff {0}")] CommentsLocked(String),
    #[error("parent comment {parent} does not belong to diff {item}")] ParentMismatch { parent: String, item: String },
    #[error("only the diff author may mark comments helpful")] NotDiffAuthor,
    #[error("faithfulness rating out of range: {0}")] RatingOutOfRange(u8),
    #[error("source and adaptation must differ")] SameWork,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("weight `{name}` must be finite and non-negative, got {value}")] InvalidWeight { name: &'static str, value: f64 },
    #[error("popularity boost ceiling {ceiling} must be below the smallest tier gap {gap}")] BoostTooLarge { ceiling: f64, gap: f64 },
    #[error("tier bands must be strictly descending")] TiersNotDescending,
    #[error("dispute band [{low}, {high}] is not within [0, 1]")] InvalidDisputeBand { low: f64, high: f64 },
    #[error("consensus thresholds invalid: high {high}, moderate {moderate}")] InvalidConsensus { high: f64, moderate: f64 },
    #[error("milestones must be positive and strictly ascending")] InvalidMilestones,
    #[error("load: {0}")] Load(String),
}

#[derive(Error, Debug)]
pub enum VersusError {
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Action(#[from] ActionError),
    #[error(transparent)] Config(#[from] ConfigError),
}

impl VersusError {
    /// Whether the caller may retry the same request unchanged.
    ///
    /// Store failures are transient from the engine's point of view; rejected
    /// actions and bad configuration are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VersusError::Store(StoreError::Unavailable(_) | StoreError::Internal(_))
        )
    }
}
