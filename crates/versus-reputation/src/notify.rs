//! Notification records written alongside reputation and social events.
//!
//! Delivery is out of scope: a notification is durable once its enclosing
//! transaction commits.

use serde_json::json;
use tracing::debug;

use versus_core::error::VersusError;
use versus_core::traits::Transaction;
use versus_core::types::{
    BadgeKind, CommentId, ItemId, NewNotification, Notification, NotificationId, NotificationKind,
    UserId,
};

use crate::badges::rule_for;
use crate::consensus::ConsensusOutcome;
use crate::Clock;

#[derive(Clone)]
pub struct Notifier {
    clock: Clock,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Append an unread notification inside `tx`.
    pub fn create(&self, tx: &mut dyn Transaction, new: NewNotification) -> Result<Notification, VersusError> {
        let notification = Notification {
            id: NotificationId::new(),
            user: new.user,
            kind: new.kind,
            title: new.title,
            message: new.message,
            read: false,
            item: new.item,
            comment: new.comment,
            metadata: new.metadata,
            created_at: (self.clock)(),
        };
        tx.insert_notification(notification.clone())?;
        debug!(user = %notification.user, kind = ?notification.kind, "notify: created");
        Ok(notification)
    }
}

// ---------------------------------------------------------------------------
// Message builders
// ---------------------------------------------------------------------------

pub fn milestone(user: UserId, total: i64) -> NewNotification {
    NewNotification {
        user,
        kind: NotificationKind::ReputationMilestone,
        title: format!("{total} reputation"),
        message: format!("You reached {total} reputation points."),
        item: None,
        comment: None,
        metadata: json!({ "total": total }),
    }
}

pub fn badge_earned(user: UserId, kind: BadgeKind, count: u64) -> NewNotification {
    let rule = rule_for(kind);
    NewNotification {
        user,
        kind: NotificationKind::BadgeEarned,
        title: format!("Badge earned: {}", rule.name),
        message: rule.description.to_string(),
        item: None,
        comment: None,
        metadata: json!({ "badge": kind, "count": count }),
    }
}

/// Author notification for a consensus outcome. `None` for outcomes that
/// carry no notification.
pub fn consensus(author: UserId, item: ItemId, outcome: ConsensusOutcome, percent: u8) -> Option<NewNotification> {
    let kind = outcome.notification_kind()?;
    let (title, message) = match outcome {
        ConsensusOutcome::HighConsensus => (
            "Your diff reached high consensus",
            format!("{percent}% of voters agree your diff is accurate."),
        ),
        ConsensusOutcome::ModerateConsensus => (
            "Your diff reached consensus",
            format!("{percent}% of voters agree your diff is accurate."),
        ),
        _ => (
            "Your diff was disputed",
            format!("Only {percent}% of voters agree your diff is accurate."),
        ),
    };
    Some(NewNotification {
        user: author,
        kind,
        title: title.to_string(),
        message,
        item: Some(item),
        comment: None,
        metadata: json!({ "outcome": outcome, "percent": percent }),
    })
}

pub fn comment_reply(parent_author: UserId, item: ItemId, reply: CommentId) -> NewNotification {
    NewNotification {
        user: parent_author,
        kind: NotificationKind::CommentReply,
        title: "New reply".to_string(),
        message: "Someone replied to your comment.".to_string(),
        item: Some(item),
        comment: Some(reply),
        metadata: json!({}),
    }
}

pub fn comment_helpful(comment_author: UserId, item: ItemId, comment: CommentId) -> NewNotification {
    NewNotification {
        user: comment_author,
        kind: NotificationKind::CommentHelpful,
        title: "Comment marked helpful".to_string(),
        message: "The diff's author marked your comment as helpful.".to_string(),
        item: Some(item),
        comment: Some(comment),
        metadata: json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_clock, RecordingTx};

    #[test]
    fn create_appends_unread() {
        let mut tx = RecordingTx::default();
        let user = UserId::from_u128(1);
        let n = Notifier::new(fixed_clock()).create(&mut tx, milestone(user, 50)).unwrap();
        assert!(!n.read);
        assert_eq!(n.metadata["total"], 50);
        assert_eq!(tx.notifications, vec![n]);
    }

    #[test]
    fn consensus_messages() {
        let user = UserId::from_u128(1);
        let item = ItemId::from_u128(2);
        let high = consensus(user, item, ConsensusOutcome::HighConsensus, 80).unwrap();
        assert_eq!(high.kind, NotificationKind::ConsensusReached);
        assert!(high.message.contains("80%"));
        let rejected = consensus(user, item, ConsensusOutcome::Rejected, 20).unwrap();
        assert_eq!(rejected.kind, NotificationKind::DiffRejected);
        assert!(consensus(user, item, ConsensusOutcome::NoOutcome, 50).is_none());
    }

    #[test]
    fn badge_message_uses_rule_name() {
        let n = badge_earned(UserId::from_u128(1), BadgeKind::SharpEye, 5);
        assert_eq!(n.title, "Badge earned: Sharp Eye");
        assert_eq!(n.metadata["badge"], "sharp_eye");
    }
}
