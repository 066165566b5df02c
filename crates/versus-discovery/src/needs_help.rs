//! "Needs help" lists: under-documented, disputed and undiscussed
//! comparisons.
//!
//! Two-stage pipeline over one pass of per-diff stats:
//! 1. [`classify_item`] flags each diff on its own tally and comment count.
//! 2. [`fold`] accumulates the flags per comparison.
//!
//! The three lists are ranked and limited independently. A comparison may
//! appear in more than one of them.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use versus_core::config::DiscoveryConfig;
use versus_core::types::{ComparisonKey, ComparisonRef, ItemStats, VoteTally};

use crate::surfaces::{ComparisonMetrics, ComparisonSummary};

/// Per-diff flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemFlags {
    pub disputed: bool,
    pub undiscussed: bool,
}

/// Votes are split rather than lopsided: enough votes, and the accurate
/// fraction inside the inclusive dispute band.
pub fn is_disputed(tally: &VoteTally, config: &DiscoveryConfig) -> bool {
    if tally.total() < config.dispute_min_votes || tally.total() == 0 {
        return false;
    }
    let fraction = tally.accurate_fraction();
    fraction >= config.dispute_low && fraction <= config.dispute_high
}

pub fn classify_item(stats: &ItemStats, config: &DiscoveryConfig) -> ItemFlags {
    ItemFlags {
        disputed: is_disputed(&stats.tally, config),
        undiscussed: stats.tally.total() > 0 && stats.live_comments == 0,
    }
}

/// Per-comparison accumulator.
#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonHelp {
    pub comparison: ComparisonRef,
    pub items: u64,
    pub votes: u64,
    pub disputed: u64,
    pub undiscussed: u64,
    pub last_updated: DateTime<Utc>,
}

impl ComparisonHelp {
    fn new(comparison: ComparisonRef, updated_at: DateTime<Utc>) -> Self {
        Self {
            comparison,
            items: 0,
            votes: 0,
            disputed: 0,
            undiscussed: 0,
            last_updated: updated_at,
        }
    }

    fn summary(&self) -> ComparisonSummary {
        ComparisonSummary {
            comparison: self.comparison.clone(),
            metrics: ComparisonMetrics {
                total_items: self.items,
                total_votes: self.votes,
                disputed_items: self.disputed,
                undiscussed_items: self.undiscussed,
                last_updated: Some(self.last_updated),
                ..ComparisonMetrics::default()
            },
        }
    }
}

/// Fold classified diffs into one accumulator per comparison.
pub fn fold(stats: &[ItemStats], config: &DiscoveryConfig) -> Vec<ComparisonHelp> {
    let mut by_comparison: HashMap<ComparisonKey, ComparisonHelp> = HashMap::new();

    for item in stats {
        let flags = classify_item(item, config);
        let acc = by_comparison
            .entry(item.comparison.key())
            .or_insert_with(|| ComparisonHelp::new(item.comparison.clone(), item.updated_at));

        acc.items += 1;
        acc.votes += item.tally.total();
        acc.disputed += u64::from(flags.disputed);
        acc.undiscussed += u64::from(flags.undiscussed);
        acc.last_updated = acc.last_updated.max(item.updated_at);
    }

    by_comparison.into_values().collect()
}

/// The three "needs help" lists.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NeedsHelp {
    /// Fewer than `min_documented_items` diffs, fewest first.
    pub under_documented: Vec<ComparisonSummary>,
    /// Most disputed diffs first.
    pub disputed: Vec<ComparisonSummary>,
    /// Most voted-but-uncommented diffs first.
    pub undiscussed: Vec<ComparisonSummary>,
}

fn by_key(a: &ComparisonHelp, b: &ComparisonHelp) -> Ordering {
    a.comparison.key().cmp(&b.comparison.key())
}

fn ranked<F>(accs: &[ComparisonHelp], keep: F, order: fn(&ComparisonHelp, &ComparisonHelp) -> Ordering, limit: usize) -> Vec<ComparisonSummary>
where
    F: Fn(&ComparisonHelp) -> bool,
{
    let mut selected: Vec<&ComparisonHelp> = accs.iter().filter(|a| keep(a)).collect();
    selected.sort_by(|a, b| order(a, b));
    selected.into_iter().take(limit).map(ComparisonHelp::summary).collect()
}

/// Build all three lists from one pass of per-diff stats.
pub fn build(stats: &[ItemStats], config: &DiscoveryConfig, limit: usize) -> NeedsHelp {
    let accs = fold(stats, config);

    let under_documented = ranked(
        &accs,
        |a| a.items < config.min_documented_items,
        |a, b| {
            a.items
                .cmp(&b.items)
                .then_with(|| b.last_updated.cmp(&a.last_updated))
                .then_with(|| by_key(a, b))
        },
        limit,
    );
    let disputed = ranked(
        &accs,
        |a| a.disputed > 0,
        |a, b| {
            b.disputed
                .cmp(&a.disputed)
                .then_with(|| b.votes.cmp(&a.votes))
                .then_with(|| by_key(a, b))
        },
        limit,
    );
    let undiscussed = ranked(
        &accs,
        |a| a.undiscussed > 0,
        |a, b| {
            b.undiscussed
                .cmp(&a.undiscussed)
                .then_with(|| b.votes.cmp(&a.votes))
                .then_with(|| by_key(a, b))
        },
        limit,
    );

    NeedsHelp {
        under_documented,
        disputed,
        undiscussed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use versus_core::types::{ItemId, WorkId, WorkKind, WorkRef};

    fn work(n: u128, kind: WorkKind) -> WorkRef {
        WorkRef {
            id: WorkId::from_u128(n),
            title: format!("Work {n}"),
            slug: format!("work-{n}"),
            kind,
        }
    }

    fn comparison(n: u128) -> ComparisonRef {
        ComparisonRef {
            source: work(n, WorkKind::Book),
            adaptation: work(n + 1000, WorkKind::Screen),
        }
    }

    fn stats(cmp: u128, tally: VoteTally, comments: u64) -> ItemStats {
        ItemStats {
            item: ItemId::new(),
            comparison: comparison(cmp),
            tally,
            live_comments: comments,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn dispute_band_is_inclusive() {
        let cfg = DiscoveryConfig::default();
        // 3 of 10 accurate = 0.3 exactly.
        assert!(is_disputed(&VoteTally::new(3, 0, 7), &cfg));
        // 7 of 10 accurate = 0.7 exactly.
        assert!(is_disputed(&VoteTally::new(7, 3, 0), &cfg));
        assert!(!is_disputed(&VoteTally::new(8, 1, 1), &cfg));
        assert!(!is_disputed(&VoteTally::new(1, 0, 9), &cfg));
    }

    #[test]
    fn dispute_needs_minimum_votes() {
        let cfg = DiscoveryConfig::default();
        assert!(!is_disputed(&VoteTally::new(2, 0, 2), &cfg));
        assert!(is_disputed(&VoteTally::new(2, 1, 2), &cfg));
    }

    #[test]
    fn undiscussed_needs_a_vote() {
        let cfg = DiscoveryConfig::default();
        assert!(!classify_item(&stats(1, VoteTally::default(), 0), &cfg).undiscussed);
        assert!(classify_item(&stats(1, VoteTally::new(1, 0, 0), 0), &cfg).undiscussed);
        assert!(!classify_item(&stats(1, VoteTally::new(1, 0, 0), 2), &cfg).undiscussed);
    }

    #[test]
    fn fold_accumulates_per_comparison() {
        let cfg = DiscoveryConfig::default();
        let accs = fold(
            &[
                stats(1, VoteTally::new(3, 1, 2), 0),
                stats(1, VoteTally::new(9, 0, 1), 4),
                stats(2, VoteTally::default(), 0),
            ],
            &cfg,
        );
        assert_eq!(accs.len(), 2);
        let first = accs.iter().find(|a| a.comparison.source.id == WorkId::from_u128(1)).unwrap();
        assert_eq!((first.items, first.votes, first.disputed, first.undiscussed), (2, 16, 1, 1));
    }

    #[test]
    fn lists_are_independent() {
        let cfg = DiscoveryConfig::default();
        let help = build(&[stats(1, VoteTally::new(3, 0, 3), 0)], &cfg, 10);
        // One diff: under-documented, disputed and undiscussed at once.
        assert_eq!(help.under_documented.len(), 1);
        assert_eq!(help.disputed.len(), 1);
        assert_eq!(help.undiscussed.len(), 1);
        assert_eq!(help.disputed[0].metrics.disputed_items, 1);
    }

    #[test]
    fn under_documented_orders_ascending() {
        let cfg = DiscoveryConfig::default();
        let help = build(
            &[
                stats(1, VoteTally::default(), 1),
                stats(1, VoteTally::default(), 1),
                stats(2, VoteTally::default(), 1),
                stats(3, VoteTally::default(), 1),
                stats(3, VoteTally::default(), 1),
                stats(3, VoteTally::default(), 1),
            ],
            &cfg,
            10,
        );
        let items: Vec<u64> = help.under_documented.iter().map(|s| s.metrics.total_items).collect();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn disputed_orders_by_count_then_votes() {
        let cfg = DiscoveryConfig::default();
        let split = VoteTally::new(3, 1, 2);
        let help = build(
            &[
                stats(1, split, 1),
                stats(2, split, 1),
                stats(2, split, 1),
                stats(3, VoteTally::new(10, 5, 10), 1),
            ],
            &cfg,
            2,
        );
        let sources: Vec<WorkId> = help.disputed.iter().map(|s| s.comparison.source.id).collect();
        assert_eq!(sources, vec![WorkId::from_u128(2), WorkId::from_u128(3)]);
    }

    proptest::proptest! {
        #[test]
        fn fold_conserves_items_and_votes(
            diffs in proptest::collection::vec((0u128..6, 0u64..8, 0u64..8, 0u64..8, 0u64..3), 0..40),
            limit in 0usize..5,
        ) {
            let cfg = DiscoveryConfig::default();
            let stats: Vec<ItemStats> = diffs
                .iter()
                .map(|&(cmp, a, n, i, c)| stats(cmp, VoteTally::new(a, n, i), c))
                .collect();

            let accs = fold(&stats, &cfg);
            proptest::prop_assert_eq!(accs.iter().map(|a| a.items).sum::<u64>(), stats.len() as u64);
            proptest::prop_assert_eq!(
                accs.iter().map(|a| a.votes).sum::<u64>(),
                stats.iter().map(|s| s.tally.total()).sum::<u64>()
            );

            let help = build(&stats, &cfg, limit);
            proptest::prop_assert!(help.under_documented.len() <= limit);
            proptest::prop_assert!(help.disputed.len() <= limit);
            proptest::prop_assert!(help.undiscussed.len() <= limit);
        }
    }
}
