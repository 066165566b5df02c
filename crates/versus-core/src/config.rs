//! Engine configuration: weight tables, windows, caps and thresholds.
//!
//! Everything the operators may tune lives here and is passed explicitly
//! into the formulas and surfaces. Every struct deserializes with
//! `#[serde(default)]` so a config file only needs the keys it overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ReputationEventKind, WorkId};

/// Top-level configuration for every engine component.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub discovery: DiscoveryConfig,
    pub search: SearchConfig,
    pub consensus: ConsensusConfig,
    pub reputation: ReputationConfig,
}

impl EngineConfig {
    /// Check every section for values that would break ranking guarantees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.discovery.validate()?;
        self.search.validate()?;
        self.consensus.validate()?;
        self.reputation.validate()
    }
}

fn check_weight(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight { name, value })
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Weights for the trending activity score.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ActivityWeights {
    /// `W_new`: weight of each diff created inside the window.
    pub new_item: f64,
    /// `W_vote`: weight of each vote cast inside the window.
    pub vote: f64,
}

impl Default for ActivityWeights {
    fn default() -> Self {
        Self {
            new_item: 3.0,
            vote: 1.0,
        }
    }
}

/// Weights for the all-time engagement score.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct EngagementWeights {
    pub item: f64,
    pub vote: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            item: 2.0,
            vote: 0.5,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub activity: ActivityWeights,
    pub engagement: EngagementWeights,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_weight("scoring.activity.new_item", self.activity.new_item)?;
        check_weight("scoring.activity.vote", self.activity.vote)?;
        check_weight("scoring.engagement.item", self.engagement.item)?;
        check_weight("scoring.engagement.vote", self.engagement.vote)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub trending_lookback_days: u32,
    /// Maximum trending entries sharing one source work.
    pub trending_diversity_cap: usize,
    pub recent_window_hours: u32,
    /// Curated allow-list of source works eligible for "featured".
    pub featured_sources: Vec<WorkId>,
    /// Comparisons with fewer live diffs than this are under-documented.
    pub min_documented_items: u64,
    /// Minimum votes before a diff can count as disputed.
    pub dispute_min_votes: u64,
    /// Inclusive lower bound of the disputed accurate-vote fraction.
    pub dispute_low: f64,
    /// Inclusive upper bound of the disputed accurate-vote fraction.
    pub dispute_high: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            trending_lookback_days: 7,
            trending_diversity_cap: 2,
            recent_window_hours: 48,
            featured_sources: Vec::new(),
            min_documented_items: 3,
            dispute_min_votes: 5,
            dispute_low: 0.3,
            dispute_high: 0.7,
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (low, high) = (self.dispute_low, self.dispute_high);
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low > high {
            return Err(ConfigError::InvalidDisputeBand { low, high });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Score bands of the relevance tiers, highest first.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct TierBands {
    pub exact: f64,
    pub prefix: f64,
    pub whole_word: f64,
    pub substring: f64,
    /// Query found in the free-text summary.
    pub summary: f64,
}

impl Default for TierBands {
    fn default() -> Self {
        Self {
            exact: 100.0,
            prefix: 70.0,
            whole_word: 50.0,
            substring: 30.0,
            summary: 10.0,
        }
    }
}

impl TierBands {
    fn primary(&self) -> [f64; 4] {
        [self.exact, self.prefix, self.whole_word, self.substring]
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct BoostConfig {
    /// Multiplier on `ln(1 + popularity)`.
    pub factor: f64,
    /// Hard cap on the boost.
    pub ceiling: f64,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            factor: 1.0,
            ceiling: 5.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub tiers: TierBands,
    /// Share of the primary tiers awarded for creator-name matches.
    pub creator_factor: f64,
    pub boost: BoostConfig,
    /// Trimmed queries shorter than this return nothing.
    pub min_query_len: usize,
    /// Shorter queries only match at word boundaries.
    pub min_substring_len: usize,
    /// Fuzzy matching kicks in when fewer candidates than this clear a tier.
    pub fuzzy_min_hits: usize,
    pub fuzzy_threshold: f64,
    pub fuzzy_weight: f64,
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tiers: TierBands::default(),
            creator_factor: 0.6,
            boost: BoostConfig::default(),
            min_query_len: 2,
            min_substring_len: 3,
            fuzzy_min_hits: 3,
            fuzzy_threshold: 0.2,
            fuzzy_weight: 10.0,
            default_limit: 20,
        }
    }
}

impl SearchConfig {
    /// Every distinct non-zero score a single field match can produce.
    fn bands(&self) -> Vec<f64> {
        let mut bands: Vec<f64> = self.tiers.primary().to_vec();
        bands.extend(self.tiers.primary().iter().map(|b| b * self.creator_factor));
        bands.push(self.tiers.summary);
        bands.sort_by(|a, b| crate::score::by_score_desc(*a, *b));
        bands.dedup();
        bands
    }

    /// Smallest distance between two adjacent bands, including the distance
    /// from the lowest band down to zero.
    ///
    /// Bands are per field. A boost below this gap never reorders two hits
    /// that differ in one field's tier. Title and creator scores add up, and
    /// two such sums may sit closer than the gap (whole-word title plus
    /// creator prefix is 92, substring title plus creator exact is 90), so
    /// popularity may order those.
    pub fn smallest_tier_gap(&self) -> f64 {
        let bands = self.bands();
        let mut gap = bands.last().copied().unwrap_or(0.0);
        for pair in bands.windows(2) {
            gap = gap.min(pair[0] - pair[1]);
        }
        gap
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("search.tiers.exact", self.tiers.exact),
            ("search.tiers.summary", self.tiers.summary),
            ("search.creator_factor", self.creator_factor),
            ("search.boost.factor", self.boost.factor),
            ("search.boost.ceiling", self.boost.ceiling),
            ("search.fuzzy_weight", self.fuzzy_weight),
        ] {
            check_weight(name, value)?;
        }

        let ordered = [
            self.tiers.exact,
            self.tiers.prefix,
            self.tiers.whole_word,
            self.tiers.substring,
            self.tiers.summary,
        ];
        if ordered.windows(2).any(|w| w[0] <= w[1]) || self.tiers.summary <= 0.0 {
            return Err(ConfigError::TiersNotDescending);
        }
        if self.creator_factor >= 1.0 {
            return Err(ConfigError::InvalidWeight {
                name: "search.creator_factor",
                value: self.creator_factor,
            });
        }

        let gap = self.smallest_tier_gap();
        if self.boost.ceiling >= gap {
            return Err(ConfigError::BoostTooLarge {
                ceiling: self.boost.ceiling,
                gap,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Votes required before a diff is classified at all.
    pub min_votes: u64,
    /// Inclusive accurate-fraction threshold for high consensus.
    pub high_fraction: f64,
    /// Inclusive accurate-fraction threshold for moderate consensus.
    pub moderate_fraction: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_votes: 10,
            high_fraction: 0.75,
            moderate_fraction: 0.5,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (high, moderate) = (self.high_fraction, self.moderate_fraction);
        if !(0.0..=1.0).contains(&high) || !(0.0..=1.0).contains(&moderate) || moderate > high {
            return Err(ConfigError::InvalidConsensus { high, moderate });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reputation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ReputationConfig {
    /// Points per event kind. Kinds missing from the table are worth zero.
    pub amounts: BTreeMap<ReputationEventKind, i64>,
    /// Exact totals that trigger a milestone notification.
    pub milestones: Vec<i64>,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        use ReputationEventKind::*;

        let amounts = [
            (DiffCreated, 5),
            (DiffHighConsensus, 10),
            (DiffModerateConsensus, 5),
            (DiffRejected, -5),
            (VoteCast, 0),
            (ComparisonVoteCast, 0),
            (CommentPosted, 1),
            (CommentReply, 0),
            (CommentHelpful, 3),
        ]
        .into_iter()
        .collect();

        Self {
            amounts,
            milestones: vec![10, 50, 100, 250, 500, 1000, 2500, 5000],
        }
    }
}

impl ReputationConfig {
    pub fn amount(&self, kind: ReputationEventKind) -> i64 {
        self.amounts.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_milestone(&self, total: i64) -> bool {
        self.milestones.contains(&total)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ascending = self.milestones.windows(2).all(|w| w[0] < w[1]);
        if !ascending || self.milestones.iter().any(|m| *m <= 0) {
            return Err(ConfigError::InvalidMilestones);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn default_smallest_gap() {
        // 50 (whole word) vs 42 (creator prefix at 60%).
        let gap = SearchConfig::default().smallest_tier_gap();
        assert!((gap - 8.0).abs() < 1e-9, "gap = {gap}");
    }

    #[test]
    fn boost_separates_single_field_bands() {
        let cfg = SearchConfig::default();
        let bands = cfg.bands();
        for pair in bands.windows(2) {
            assert!(pair[1] + cfg.boost.ceiling < pair[0], "{pair:?}");
        }
        // An exact title still outranks a substring title whatever the creator adds.
        let best_substring = cfg.tiers.substring + cfg.tiers.exact * cfg.creator_factor + cfg.boost.ceiling;
        assert!(cfg.tiers.exact > best_substring);
        // Combined title + creator sums are not band separated.
        let whole_word_plus_prefix = cfg.tiers.whole_word + cfg.tiers.prefix * cfg.creator_factor;
        let substring_plus_exact = cfg.tiers.substring + cfg.tiers.exact * cfg.creator_factor;
        assert!((whole_word_plus_prefix - substring_plus_exact).abs() < cfg.smallest_tier_gap());
    }

    #[test]
    fn oversized_boost_rejected() {
        let mut cfg = SearchConfig::default();
        cfg.boost.ceiling = 9.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::BoostTooLarge { .. })));
    }

    #[test]
    fn unordered_tiers_rejected() {
        let mut cfg = SearchConfig::default();
        cfg.tiers.prefix = 120.0;
        assert_eq!(cfg.validate(), Err(ConfigError::TiersNotDescending));
    }

    #[test]
    fn negative_weight_rejected() {
        let cfg = ScoringConfig {
            activity: ActivityWeights {
                new_item: -1.0,
                vote: 1.0,
            },
            ..ScoringConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidWeight { .. })));
    }

    #[test]
    fn inverted_dispute_band_rejected() {
        let cfg = DiscoveryConfig {
            dispute_low: 0.8,
            dispute_high: 0.2,
            ..DiscoveryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn milestones_must_ascend() {
        let cfg = ReputationConfig {
            milestones: vec![10, 10, 50],
            ..ReputationConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidMilestones));
    }

    #[test]
    fn missing_amount_is_zero() {
        let cfg = ReputationConfig {
            amounts: BTreeMap::new(),
            ..ReputationConfig::default()
        };
        assert_eq!(cfg.amount(ReputationEventKind::DiffCreated), 0);
        assert_eq!(
            ReputationConfig::default().amount(ReputationEventKind::DiffHighConsensus),
            10
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{ "scoring": { "activity": { "new_item": 5.0 } } }"#).unwrap();
        assert_eq!(cfg.scoring.activity.new_item, 5.0);
        assert_eq!(cfg.scoring.activity.vote, 1.0);
        assert_eq!(cfg.consensus.min_votes, 10);
    }

    #[test]
    fn amounts_deserialize_by_kind_name() {
        let cfg: ReputationConfig =
            serde_json::from_str(r#"{ "amounts": { "vote_cast": 1 } }"#).unwrap();
        assert_eq!(cfg.amount(ReputationEventKind::VoteCast), 1);
        assert_eq!(cfg.amount(ReputationEventKind::DiffCreated), 0);
    }
}
