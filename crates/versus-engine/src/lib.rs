//! # versus-engine
//! Ties the ranking and reputation components to a store:
//!
//! - [`engine::Engine`]: atomic write paths (diffs, votes, comments,
//!   helpful marks, comparison votes) plus search and discovery entry points.
//! - [`store::MemoryStore`]: reference aggregate store with rollback.
//! - [`config::load`]: layered configuration loading.

pub mod config;
pub mod engine;
pub mod store;

pub use engine::{Engine, NewComment, NewComparisonVote, NewDiff, VoteReceipt};
pub use store::{MemoryStore, Snapshot, WorkRecord};
