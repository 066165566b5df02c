//! Consensus classification of a diff's live vote tally.
//!
//! The outcome is never stored. It is recomputed from the current tally each
//! time the caller asks, typically right after a vote moved the tally across
//! the minimum-votes gate.

use serde::{Deserialize, Serialize};

use versus_core::config::ConsensusConfig;
use versus_core::types::{NotificationKind, ReputationEventKind, VoteTally};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusOutcome {
    /// Fewer votes than the gate requires.
    Unevaluated,
    HighConsensus,
    ModerateConsensus,
    /// More disagree than agree votes, outside both consensus bands.
    Rejected,
    /// Gate met but no band applies, e.g. an even split.
    NoOutcome,
}

impl ConsensusOutcome {
    /// Reputation awarded to the diff's author for this outcome.
    pub fn reputation_kind(self) -> Option<ReputationEventKind> {
        match self {
            ConsensusOutcome::HighConsensus => Some(ReputationEventKind::DiffHighConsensus),
            ConsensusOutcome::ModerateConsensus => Some(ReputationEventKind::DiffModerateConsensus),
            ConsensusOutcome::Rejected => Some(ReputationEventKind::DiffRejected),
            ConsensusOutcome::Unevaluated | ConsensusOutcome::NoOutcome => None,
        }
    }

    pub fn notification_kind(self) -> Option<NotificationKind> {
        match self {
            ConsensusOutcome::HighConsensus | ConsensusOutcome::ModerateConsensus => {
                Some(NotificationKind::ConsensusReached)
            }
            ConsensusOutcome::Rejected => Some(NotificationKind::DiffRejected),
            ConsensusOutcome::Unevaluated | ConsensusOutcome::NoOutcome => None,
        }
    }
}

/// Pure classifier over vote tallies.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Classify a tally. Both band thresholds are inclusive.
    ///
    /// ```
    /// use versus_core::types::VoteTally;
    /// use versus_reputation::consensus::{ConsensusEngine, ConsensusOutcome};
    ///
    /// let engine = ConsensusEngine::default();
    /// assert_eq!(engine.classify(&VoteTally::new(8, 1, 1)), ConsensusOutcome::HighConsensus);
    /// assert_eq!(engine.classify(&VoteTally::new(8, 0, 0)), ConsensusOutcome::Unevaluated);
    /// ```
    pub fn classify(&self, tally: &VoteTally) -> ConsensusOutcome {
        if tally.total() < self.config.min_votes || tally.total() == 0 {
            return ConsensusOutcome::Unevaluated;
        }
        let fraction = tally.accurate_fraction();
        if fraction >= self.config.high_fraction {
            ConsensusOutcome::HighConsensus
        } else if fraction >= self.config.moderate_fraction {
            ConsensusOutcome::ModerateConsensus
        } else if tally.inaccurate > tally.accurate {
            ConsensusOutcome::Rejected
        } else {
            ConsensusOutcome::NoOutcome
        }
    }

    /// Whether a tally change just crossed the minimum-votes gate upward.
    ///
    /// A retraction that drops below the gate followed by a new vote crosses
    /// it again.
    pub fn gate_crossed(&self, before: &VoteTally, after: &VoteTally) -> bool {
        before.total() < self.config.min_votes && after.total() >= self.config.min_votes
    }
}

/// Agree share of a tally as a rounded percentage.
pub fn agree_percent(tally: &VoteTally) -> u8 {
    (tally.accurate_fraction() * 100.0).round() as u8
}
