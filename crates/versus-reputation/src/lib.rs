//! # versus-reputation
//! Turns vote aggregates into reputation, badges and notifications.
//!
//! Every component writes through a [`versus_core::traits::Transaction`], so
//! the caller decides the atomic unit.

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub mod badges;
pub mod consensus;
pub mod ledger;
pub mod notify;

#[cfg(test)]
mod testing;

pub use badges::BadgeEngine;
pub use consensus::{ConsensusEngine, ConsensusOutcome};
pub use ledger::ReputationLedger;
pub use notify::Notifier;

/// Timestamp source shared by the write-path components.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}
