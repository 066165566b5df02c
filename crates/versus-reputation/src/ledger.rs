//! Append-only reputation ledger with a store-maintained running total.
//!
//! Each award appends one immutable event and adds its amount to the user's
//! total through [`Transaction::increment_reputation`], which is atomic in
//! the store. A milestone notification fires when the new total exactly
//! equals a configured milestone; a single award that jumps past a milestone
//! does not fire it.
//!
//! The ledger keeps no dedup key. Triggering an award at most once per
//! underlying action is the caller's contract.

use std::fmt;

use tracing::{debug, info};

use versus_core::config::ReputationConfig;
use versus_core::error::VersusError;
use versus_core::traits::Transaction;
use versus_core::types::{EventId, EventLink, ReputationEvent, ReputationEventKind, UserId};

use crate::notify::{self, Notifier};
use crate::Clock;

pub struct ReputationLedger {
    config: ReputationConfig,
    notifier: Notifier,
    clock: Clock,
}

impl fmt::Debug for ReputationLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReputationLedger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReputationLedger {
    pub fn new(config: ReputationConfig, notifier: Notifier, clock: Clock) -> Self {
        Self {
            config,
            notifier,
            clock,
        }
    }

    pub fn config(&self) -> &ReputationConfig {
        &self.config
    }

    /// Award `user` the configured amount for `kind`.
    ///
    /// Returns `None` without writing anything when the kind is worth zero.
    pub fn award(
        &self,
        tx: &mut dyn Transaction,
        user: UserId,
        kind: ReputationEventKind,
        link: EventLink,
    ) -> Result<Option<ReputationEvent>, VersusError> {
        let amount = self.config.amount(kind);
        if amount == 0 {
            return Ok(None);
        }

        let event = ReputationEvent {
            id: EventId::new(),
            user,
            kind,
            amount,
            link,
            created_at: (self.clock)(),
        };
        tx.append_reputation_event(event.clone())?;
        let total = tx.increment_reputation(user, amount)?;
        debug!(%user, ?kind, amount, total, "reputation: awarded");

        if self.config.is_milestone(total) {
            info!(%user, total, "reputation: milestone reached");
            self.notifier.create(tx, notify::milestone(user, total))?;
        }
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_clock, RecordingTx};
    use versus_core::types::{ItemId, NotificationKind};

    fn ledger() -> ReputationLedger {
        let clock = fixed_clock();
        ReputationLedger::new(ReputationConfig::default(), Notifier::new(clock.clone()), clock)
    }

    #[test]
    fn zero_amount_records_nothing() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        let event = ledger()
            .award(&mut tx, user, ReputationEventKind::VoteCast, EventLink::default())
            .unwrap();
        assert!(event.is_none());
        assert!(tx.events.is_empty());
        assert_eq!(tx.total(user), 0);
    }

    #[test]
    fn award_appends_and_increments() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        let item = ItemId::from_u128(9);
        let event = ledger()
            .award(&mut tx, user, ReputationEventKind::DiffCreated, EventLink::item(item))
            .unwrap()
            .unwrap();
        assert_eq!(event.amount, 5);
        assert_eq!(event.link.item, Some(item));
        assert_eq!(tx.total(user), 5);
        assert_eq!(tx.events, vec![event]);
    }

    #[test]
    fn exact_milestone_notifies() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        tx.set_total(user, 40);
        ledger()
            .award(&mut tx, user, ReputationEventKind::DiffHighConsensus, EventLink::default())
            .unwrap();
        assert_eq!(tx.total(user), 50);
        assert_eq!(tx.notifications.len(), 1);
        assert_eq!(tx.notifications[0].kind, NotificationKind::ReputationMilestone);
    }

    #[test]
    fn jumping_over_milestone_is_silent() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        tx.set_total(user, 43);
        ledger()
            .award(&mut tx, user, ReputationEventKind::DiffHighConsensus, EventLink::default())
            .unwrap();
        assert_eq!(tx.total(user), 53);
        assert!(tx.notifications.is_empty());
    }

    #[test]
    fn negative_awards_reduce_total() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        tx.set_total(user, 15);
        ledger()
            .award(&mut tx, user, ReputationEventKind::DiffRejected, EventLink::default())
            .unwrap();
        // 10 is a milestone, reached on the way down.
        assert_eq!(tx.total(user), 10);
        assert_eq!(tx.notifications.len(), 1);
    }

    #[test]
    fn replay_is_not_deduplicated() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        let l = ledger();
        let link = EventLink::item(ItemId::from_u128(3));
        l.award(&mut tx, user, ReputationEventKind::CommentHelpful, link).unwrap();
        l.award(&mut tx, user, ReputationEventKind::CommentHelpful, link).unwrap();
        assert_eq!(tx.events.len(), 2);
        assert_eq!(tx.total(user), 6);
    }
}
