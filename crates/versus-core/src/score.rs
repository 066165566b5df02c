//! Score formulas for the discovery surfaces and search.
//!
//! Pure computation: no storage, no IO. Every weight comes from a config
//! struct passed by the caller so ranking can be tuned without touching the
//! surfaces that use it.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::config::{ActivityWeights, BoostConfig, EngagementWeights};

/// Trending score for a comparison over the lookback window.
///
/// `recent_new_items * W_new + recent_votes * W_vote`
///
/// # Examples
///
/// ```
/// use versus_core::config::ActivityWeights;
/// use versus_core::score::activity_score;
///
/// let weights = ActivityWeights { new_item: 3.0, vote: 1.0 };
/// assert_eq!(activity_score(2, 4, &weights), 10.0);
/// assert_eq!(activity_score(0, 0, &weights), 0.0);
/// ```
pub fn activity_score(recent_new_items: u64, recent_votes: u64, weights: &ActivityWeights) -> f64 {
    recent_new_items as f64 * weights.new_item + recent_votes as f64 * weights.vote
}

/// All-time engagement score used by "featured" and "most documented".
///
/// `total_items * W_items + total_votes * W_votes`
///
/// ```
/// use versus_core::config::EngagementWeights;
/// use versus_core::score::engagement_score;
///
/// let weights = EngagementWeights { item: 2.0, vote: 0.5 };
/// assert_eq!(engagement_score(5, 10, &weights), 15.0);
/// ```
pub fn engagement_score(total_items: u64, total_votes: u64, weights: &EngagementWeights) -> f64 {
    total_items as f64 * weights.item + total_votes as f64 * weights.vote
}

/// Small additive boost for popular candidates.
///
/// Grows logarithmically and is clamped at `boost.ceiling`, which config
/// validation keeps below the smallest gap between relevance tiers.
/// Negative or non-finite popularity contributes nothing.
pub fn popularity_boost(popularity: f64, boost: &BoostConfig) -> f64 {
    if !popularity.is_finite() || popularity <= 0.0 {
        return 0.0;
    }
    (popularity.ln_1p() * boost.factor).clamp(0.0, boost.ceiling)
}

/// Descending comparison of two float scores with a total order.
pub fn by_score_desc(a: f64, b: f64) -> Ordering {
    OrderedFloat(b).cmp(&OrderedFloat(a))
}
