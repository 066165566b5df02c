//! In-memory `Transaction` that records every write, for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use versus_core::config::ConsensusConfig;
use versus_core::error::{StoreError, VersusError};
use versus_core::traits::Transaction;
use versus_core::types::{
    Badge, Comment, CommentId, ComparisonVote, ContentItem, ItemId, Notification,
    ReputationEvent, UserCounters, UserId, Vote, VoteChange, VoteTally, WorkId, WorkRef,
};

use crate::Clock;

pub fn fixed_clock() -> Clock {
    Arc::new(|| Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

#[derive(Default)]
pub struct RecordingTx {
    pub counters: UserCounters,
    pub events: Vec<ReputationEvent>,
    pub badges: Vec<Badge>,
    pub notifications: Vec<Notification>,
    totals: HashMap<UserId, i64>,
}

impl RecordingTx {
    pub fn total(&self, user: UserId) -> i64 {
        self.totals.get(&user).copied().unwrap_or(0)
    }

    pub fn set_total(&mut self, user: UserId, total: i64) {
        self.totals.insert(user, total);
    }
}

fn unsupported() -> VersusError {
    StoreError::Internal("not recorded".into()).into()
}

impl Transaction for RecordingTx {
    fn work(&self, _: WorkId) -> Result<Option<WorkRef>, VersusError> {
        Ok(None)
    }

    fn content_item(&self, _: ItemId) -> Result<Option<ContentItem>, VersusError> {
        Ok(None)
    }

    fn comment(&self, _: CommentId) -> Result<Option<Comment>, VersusError> {
        Ok(None)
    }

    fn vote_tally(&self, _: ItemId) -> Result<VoteTally, VersusError> {
        Ok(VoteTally::default())
    }

    fn user_counters(&self, _: UserId, _: &ConsensusConfig) -> Result<UserCounters, VersusError> {
        Ok(self.counters)
    }

    fn insert_item(&mut self, _: ContentItem) -> Result<(), VersusError> {
        Err(unsupported())
    }

    fn upsert_vote(&mut self, _: Vote) -> Result<VoteChange, VersusError> {
        Err(unsupported())
    }

    fn insert_comment(&mut self, _: Comment) -> Result<(), VersusError> {
        Err(unsupported())
    }

    fn set_comment_helpful(&mut self, _: CommentId) -> Result<bool, VersusError> {
        Err(unsupported())
    }

    fn upsert_comparison_vote(&mut self, _: ComparisonVote) -> Result<(), VersusError> {
        Err(unsupported())
    }

    fn append_reputation_event(&mut self, event: ReputationEvent) -> Result<(), VersusError> {
        self.events.push(event);
        Ok(())
    }

    fn increment_reputation(&mut self, user: UserId, delta: i64) -> Result<i64, VersusError> {
        let total = self.totals.entry(user).or_insert(0);
        *total += delta;
        Ok(*total)
    }

    fn insert_badge_if_absent(&mut self, badge: Badge) -> Result<bool, VersusError> {
        if self.badges.iter().any(|b| b.user == badge.user && b.kind == badge.kind) {
            return Ok(false);
        }
        self.badges.push(badge);
        Ok(true)
    }

    fn insert_notification(&mut self, notification: Notification) -> Result<(), VersusError> {
        self.notifications.push(notification);
        Ok(())
    }
}
