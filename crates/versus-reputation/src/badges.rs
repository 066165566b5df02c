//! Achievement badges.
//!
//! Counters are read fresh from the store on every check. Awards go through
//! [`Transaction::insert_badge_if_absent`], so a badge exists at most once
//! per (user, kind) even when two checks race.

use std::fmt;

use serde_json::json;
use tracing::info;

use versus_core::config::ConsensusConfig;
use versus_core::error::VersusError;
use versus_core::traits::Transaction;
use versus_core::types::{Badge, BadgeId, BadgeKind, UserCounters, UserId};

use crate::notify::{self, Notifier};
use crate::Clock;

/// Which counter a rule reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    DiffsCreated,
    VotesCast,
    CommentsPosted,
    ComparisonVotes,
    HighAccuracyDiffs,
    HelpfulComments,
}

impl Counter {
    pub fn read(self, counters: &UserCounters) -> u64 {
        match self {
            Counter::DiffsCreated => counters.diffs_created,
            Counter::VotesCast => counters.votes_cast,
            Counter::CommentsPosted => counters.comments_posted,
            Counter::ComparisonVotes => counters.comparison_votes,
            Counter::HighAccuracyDiffs => counters.high_accuracy_diffs,
            Counter::HelpfulComments => counters.helpful_comments,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleFamily {
    /// First action or the Nth action at fixed breakpoints.
    Milestone,
    /// Contributions that earned community approval.
    Quality,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BadgeRule {
    pub kind: BadgeKind,
    pub name: &'static str,
    pub description: &'static str,
    pub family: RuleFamily,
    pub counter: Counter,
    pub threshold: u64,
}

const fn rule(
    kind: BadgeKind,
    name: &'static str,
    description: &'static str,
    family: RuleFamily,
    counter: Counter,
    threshold: u64,
) -> BadgeRule {
    BadgeRule {
        kind,
        name,
        description,
        family,
        counter,
        threshold,
    }
}

use BadgeKind as B;
use Counter as C;
use RuleFamily::{Milestone, Quality};

/// Every badge and what earns it. One rule per kind.
pub static RULES: [BadgeRule; 12] = [
    rule(B::FirstDiff, "First Diff", "Documented your first difference.", Milestone, C::DiffsCreated, 1),
    rule(B::Documentarian, "Documentarian", "Documented 10 differences.", Milestone, C::DiffsCreated, 10),
    rule(B::Archivist, "Archivist", "Documented 50 differences.", Milestone, C::DiffsCreated, 50),
    rule(B::FirstVote, "First Vote", "Cast your first vote on a difference.", Milestone, C::VotesCast, 1),
    rule(B::Critic, "Critic", "Cast 100 votes.", Milestone, C::VotesCast, 100),
    rule(B::Arbiter, "Arbiter", "Cast 500 votes.", Milestone, C::VotesCast, 500),
    rule(B::FirstComment, "First Comment", "Posted your first comment.", Milestone, C::CommentsPosted, 1),
    rule(B::Conversationalist, "Conversationalist", "Posted 50 comments.", Milestone, C::CommentsPosted, 50),
    rule(B::FirstVerdict, "First Verdict", "Picked a side between a book and its adaptation.", Milestone, C::ComparisonVotes, 1),
    rule(B::SharpEye, "Sharp Eye", "5 of your differences reached high consensus.", Quality, C::HighAccuracyDiffs, 5),
    rule(B::TrustedSource, "Trusted Source", "25 of your differences reached high consensus.", Quality, C::HighAccuracyDiffs, 25),
    rule(B::Helpful, "Helpful", "5 of your comments were marked helpful.", Quality, C::HelpfulComments, 5),
];

pub fn rule_for(kind: BadgeKind) -> &'static BadgeRule {
    // RULES has exactly one entry per BadgeKind, in declaration order.
    &RULES[kind as usize]
}

pub struct BadgeEngine {
    consensus: ConsensusConfig,
    notifier: Notifier,
    clock: Clock,
}

impl fmt::Debug for BadgeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BadgeEngine").finish_non_exhaustive()
    }
}

impl BadgeEngine {
    pub fn new(consensus: ConsensusConfig, notifier: Notifier, clock: Clock) -> Self {
        Self {
            consensus,
            notifier,
            clock,
        }
    }

    /// Award every badge whose threshold `user` now meets and does not hold
    /// yet. Returns only the newly awarded badges.
    pub fn check_and_award(&self, tx: &mut dyn Transaction, user: UserId) -> Result<Vec<Badge>, VersusError> {
        let counters = tx.user_counters(user, &self.consensus)?;
        let mut awarded = Vec::new();

        for rule in RULES.iter() {
            let count = rule.counter.read(&counters);
            if count < rule.threshold {
                continue;
            }
            let badge = Badge {
                id: BadgeId::new(),
                user,
                kind: rule.kind,
                metadata: json!({ "count": count, "threshold": rule.threshold }),
                awarded_at: (self.clock)(),
            };
            if !tx.insert_badge_if_absent(badge.clone())? {
                continue;
            }
            info!(%user, badge = rule.name, count, "badges: awarded");
            self.notifier.create(tx, notify::badge_earned(user, rule.kind, count))?;
            awarded.push(badge);
        }
        Ok(awarded)
    }
}
