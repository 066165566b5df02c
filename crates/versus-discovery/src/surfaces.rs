//! Discovery surfaces over comparison aggregates.
//!
//! Each surface asks the store for pre-counted aggregates (restricted to the
//! viewer's spoiler tolerance), scores them with the configured weights and
//! returns a plain ordered list. Surfaces are independent read-only queries:
//! [`Discovery::home`] runs all of them and degrades a failing one to an
//! empty list.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use versus_core::config::{DiscoveryConfig, ScoringConfig};
use versus_core::diversity::diversify;
use versus_core::error::VersusError;
use versus_core::score::{activity_score, by_score_desc, engagement_score};
use versus_core::spoiler::{ItemScope, SpoilerLevel};
use versus_core::traits::ActivityStore;
use versus_core::types::{ComparisonActivity, ComparisonRef, ComparisonTotals};

use crate::needs_help::{self, NeedsHelp};

/// Metrics a surface ranked by. Fields a surface does not use stay zero.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ComparisonMetrics {
    pub score: f64,
    pub total_items: u64,
    pub total_votes: u64,
    pub recent_items: u64,
    pub recent_votes: u64,
    pub disputed_items: u64,
    pub undiscussed_items: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One entry on a discovery surface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ComparisonSummary {
    pub comparison: ComparisonRef,
    pub metrics: ComparisonMetrics,
}

/// Common request parameters for every surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceQuery {
    pub limit: usize,
    /// Highest spoiler level the viewer accepts.
    pub max_spoiler: SpoilerLevel,
}

impl SurfaceQuery {
    /// A query with no spoiler restriction.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            max_spoiler: SpoilerLevel::Full,
        }
    }

    pub fn with_max_spoiler(mut self, max_spoiler: SpoilerLevel) -> Self {
        self.max_spoiler = max_spoiler;
        self
    }

    fn scope(&self) -> ItemScope {
        ItemScope::up_to(self.max_spoiler)
    }
}

/// Every surface at once, as served on the landing page.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HomeFeed {
    pub trending: Vec<ComparisonSummary>,
    pub featured: Vec<ComparisonSummary>,
    pub recently_updated: Vec<ComparisonSummary>,
    pub most_documented: Vec<ComparisonSummary>,
    pub needs_help: NeedsHelp,
}

/// Builds the discovery surfaces.
pub struct Discovery {
    store: Arc<dyn ActivityStore>,
    scoring: ScoringConfig,
    config: DiscoveryConfig,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field("scoring", &self.scoring)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Discovery {
    /// Create surfaces reading from `store`, using the system clock.
    pub fn new(store: Arc<dyn ActivityStore>, scoring: ScoringConfig, config: DiscoveryConfig) -> Self {
        Self::with_clock(store, scoring, config, Utc::now)
    }

    /// Create surfaces with a custom clock for testing.
    pub fn with_clock(
        store: Arc<dyn ActivityStore>,
        scoring: ScoringConfig,
        config: DiscoveryConfig,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            scoring,
            config,
            clock: Box::new(clock),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Comparisons with the most activity over the last `lookback_days`.
    ///
    /// Zero-activity comparisons are excluded. Ties fall back to recent new
    /// diffs, then total diffs. At most `trending_diversity_cap` entries share
    /// a source work.
    pub fn trending(&self, query: &SurfaceQuery, lookback_days: u32) -> Result<Vec<ComparisonSummary>, VersusError> {
        let since = window_start((self.clock)(), Duration::days(i64::from(lookback_days)));
        let activity = self.store.comparison_activity(since, &query.scope())?;

        let mut scored: Vec<(f64, ComparisonActivity)> = activity
            .into_iter()
            .map(|a| (activity_score(a.recent_items, a.recent_votes, &self.scoring.activity), a))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            by_score_desc(*sa, *sb)
                .then_with(|| b.recent_items.cmp(&a.recent_items))
                .then_with(|| b.total_items.cmp(&a.total_items))
                .then_with(|| a.comparison.key().cmp(&b.comparison.key()))
        });

        let kept = diversify(
            scored,
            |(_, a)| a.comparison.source.id,
            self.config.trending_diversity_cap,
            query.limit,
        );
        debug!(lookback_days, results = kept.len(), "discovery: trending");

        Ok(kept
            .into_iter()
            .map(|(score, a)| ComparisonSummary {
                comparison: a.comparison,
                metrics: ComparisonMetrics {
                    score,
                    total_items: a.total_items,
                    recent_items: a.recent_items,
                    recent_votes: a.recent_votes,
                    last_updated: Some(a.last_updated),
                    ..ComparisonMetrics::default()
                },
            })
            .collect())
    }

    /// Curated source works ranked by all-time engagement.
    pub fn featured(&self, query: &SurfaceQuery) -> Result<Vec<ComparisonSummary>, VersusError> {
        if self.config.featured_sources.is_empty() {
            debug!("discovery: no featured sources configured");
            return Ok(Vec::new());
        }
        let totals = self.store.comparison_totals(&query.scope())?;
        let mut scored: Vec<(f64, ComparisonTotals)> = totals
            .into_iter()
            .filter(|t| self.config.featured_sources.contains(&t.comparison.source.id))
            .map(|t| (self.engagement(&t), t))
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            by_score_desc(*sa, *sb)
                .then_with(|| b.last_updated.cmp(&a.last_updated))
                .then_with(|| by_key(a, b))
        });
        scored.truncate(query.limit);

        Ok(scored.into_iter().map(|(score, t)| totals_summary(score, t)).collect())
    }

    /// Comparisons with a diff updated inside `recent_window_hours`, newest
    /// first.
    pub fn recently_updated(&self, query: &SurfaceQuery) -> Result<Vec<ComparisonSummary>, VersusError> {
        let since = window_start((self.clock)(), Duration::hours(i64::from(self.config.recent_window_hours)));
        let mut totals: Vec<ComparisonTotals> = self
            .store
            .comparison_totals(&query.scope())?
            .into_iter()
            .filter(|t| t.last_updated >= since)
            .collect();

        totals.sort_by(|a, b| b.last_updated.cmp(&a.last_updated).then_with(|| by_key(a, b)));
        totals.truncate(query.limit);

        Ok(totals
            .into_iter()
            .map(|t| totals_summary(self.engagement(&t), t))
            .collect())
    }

    /// Comparisons with the most live diffs, then the most votes.
    pub fn most_documented(&self, query: &SurfaceQuery) -> Result<Vec<ComparisonSummary>, VersusError> {
        let mut totals: Vec<ComparisonTotals> = self
            .store
            .comparison_totals(&query.scope())?
            .into_iter()
            .filter(|t| t.total_items > 0)
            .collect();

        totals.sort_by(|a, b| {
            b.total_items
                .cmp(&a.total_items)
                .then_with(|| b.total_votes.cmp(&a.total_votes))
                .then_with(|| by_key(a, b))
        });
        totals.truncate(query.limit);

        Ok(totals
            .into_iter()
            .map(|t| totals_summary(self.engagement(&t), t))
            .collect())
    }

    /// Under-documented, disputed and undiscussed comparisons.
    pub fn needs_help(&self, query: &SurfaceQuery) -> Result<NeedsHelp, VersusError> {
        let stats = self.store.item_stats(&query.scope())?;
        Ok(needs_help::build(&stats, &self.config, query.limit))
    }

    /// Run every surface. A failing surface is logged and served empty.
    pub fn home(&self, query: &SurfaceQuery) -> HomeFeed {
        HomeFeed {
            trending: or_empty("trending", self.trending(query, self.config.trending_lookback_days)),
            featured: or_empty("featured", self.featured(query)),
            recently_updated: or_empty("recently_updated", self.recently_updated(query)),
            most_documented: or_empty("most_documented", self.most_documented(query)),
            needs_help: or_empty("needs_help", self.needs_help(query)),
        }
    }

    fn engagement(&self, totals: &ComparisonTotals) -> f64 {
        engagement_score(totals.total_items, totals.total_votes, &self.scoring.engagement)
    }
}

/// Start of a window ending at `now`. A span reaching past the earliest
/// representable time means all time.
fn window_start(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn by_key(a: &ComparisonTotals, b: &ComparisonTotals) -> Ordering {
    a.comparison.key().cmp(&b.comparison.key())
}

fn totals_summary(score: f64, t: ComparisonTotals) -> ComparisonSummary {
    ComparisonSummary {
        comparison: t.comparison,
        metrics: ComparisonMetrics {
            score,
            total_items: t.total_items,
            total_votes: t.total_votes,
            last_updated: Some(t.last_updated),
            ..ComparisonMetrics::default()
        },
    }
}

fn or_empty<T: Default>(surface: &'static str, result: Result<T, VersusError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(surface, error = %e, "discovery: surface failed, serving empty");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use versus_core::error::StoreError;
    use versus_core::types::{
        ComparisonKey, ComparisonVote, ItemId, ItemStats, SearchCandidate, VoteTally, WorkId,
        WorkKind, WorkRef,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn comparison(source: u128, adaptation: u128) -> ComparisonRef {
        let work = |n: u128, kind| WorkRef {
            id: WorkId::from_u128(n),
            title: format!("Work {n}"),
            slug: format!("work-{n}"),
            kind,
        };
        ComparisonRef {
            source: work(source, WorkKind::Book),
            adaptation: work(adaptation, WorkKind::Screen),
        }
    }

    /// Store returning canned aggregates, or failing every call.
    #[derive(Default)]
    struct CannedStore {
        activity: Vec<ComparisonActivity>,
        totals: Vec<ComparisonTotals>,
        stats: Vec<ItemStats>,
        fail: bool,
    }

    impl CannedStore {
        fn check(&self) -> Result<(), VersusError> {
            if self.fail {
                Err(StoreError::Unavailable("down".into()).into())
            } else {
                Ok(())
            }
        }
    }

    impl ActivityStore for CannedStore {
        fn comparison_activity(&self, since: DateTime<Utc>, _: &ItemScope) -> Result<Vec<ComparisonActivity>, VersusError> {
            self.check()?;
            Ok(self.activity.iter().filter(|a| a.last_updated >= since).cloned().collect())
        }

        fn comparison_totals(&self, _: &ItemScope) -> Result<Vec<ComparisonTotals>, VersusError> {
            self.check()?;
            Ok(self.totals.clone())
        }

        fn item_stats(&self, _: &ItemScope) -> Result<Vec<ItemStats>, VersusError> {
            self.check()?;
            Ok(self.stats.clone())
        }

        fn search_candidates(&self) -> Result<Vec<SearchCandidate>, VersusError> {
            Ok(Vec::new())
        }

        fn comparison_votes(&self, _: &ComparisonKey) -> Result<Vec<ComparisonVote>, VersusError> {
            Ok(Vec::new())
        }

        fn comparison_by_slugs(&self, _: &str, _: &str) -> Result<Option<ComparisonRef>, VersusError> {
            Ok(None)
        }
    }

    fn activity(source: u128, adaptation: u128, recent_items: u64, recent_votes: u64, total_items: u64) -> ComparisonActivity {
        ComparisonActivity {
            comparison: comparison(source, adaptation),
            recent_items,
            recent_votes,
            total_items,
            last_updated: now() - Duration::days(1),
        }
    }

    fn totals(source: u128, adaptation: u128, items: u64, votes: u64, age_hours: i64) -> ComparisonTotals {
        ComparisonTotals {
            comparison: comparison(source, adaptation),
            total_items: items,
            total_votes: votes,
            last_updated: now() - Duration::hours(age_hours),
        }
    }

    fn discovery(store: CannedStore, config: DiscoveryConfig) -> Discovery {
        Discovery::with_clock(Arc::new(store), ScoringConfig::default(), config, now)
    }

    fn pairs(list: &[ComparisonSummary]) -> Vec<(WorkId, WorkId)> {
        list.iter()
            .map(|s| (s.comparison.source.id, s.comparison.adaptation.id))
            .collect()
    }

    fn id(n: u128) -> WorkId {
        WorkId::from_u128(n)
    }

    #[test]
    fn trending_scores_and_excludes_zero() {
        let store = CannedStore {
            activity: vec![activity(1, 11, 2, 0, 2), activity(2, 21, 0, 0, 5), activity(3, 31, 1, 5, 1)],
            ..CannedStore::default()
        };
        let list = discovery(store, DiscoveryConfig::default())
            .trending(&SurfaceQuery::new(10), 7)
            .unwrap();
        assert_eq!(pairs(&list), vec![(id(3), id(31)), (id(1), id(11))]);
        assert_eq!(list[0].metrics.score, 8.0);
        assert_eq!(list[1].metrics.score, 6.0);
    }

    #[test]
    fn trending_ties_break_on_new_items_then_totals() {
        let store = CannedStore {
            activity: vec![
                activity(1, 11, 1, 3, 9), // 6
                activity(2, 21, 2, 0, 2), // 6, more new diffs
                activity(3, 31, 1, 3, 4), // 6, fewer totals than 1
            ],
            ..CannedStore::default()
        };
        let list = discovery(store, DiscoveryConfig::default())
            .trending(&SurfaceQuery::new(10), 7)
            .unwrap();
        assert_eq!(pairs(&list), vec![(id(2), id(21)), (id(1), id(11)), (id(3), id(31))]);
    }

    #[test]
    fn trending_caps_per_source_work() {
        let store = CannedStore {
            activity: vec![
                activity(1, 11, 4, 0, 4),
                activity(1, 12, 3, 0, 3),
                activity(1, 13, 2, 0, 2),
                activity(2, 21, 1, 0, 1),
            ],
            ..CannedStore::default()
        };
        let list = discovery(store, DiscoveryConfig::default())
            .trending(&SurfaceQuery::new(10), 7)
            .unwrap();
        assert_eq!(pairs(&list), vec![(id(1), id(11)), (id(1), id(12)), (id(2), id(21))]);
    }

    #[test]
    fn featured_restricted_to_allow_list() {
        let store = CannedStore {
            totals: vec![totals(1, 11, 2, 2, 5), totals(2, 21, 50, 50, 5), totals(3, 31, 4, 0, 1)],
            ..CannedStore::default()
        };
        let config = DiscoveryConfig {
            featured_sources: vec![id(1), id(3)],
            ..DiscoveryConfig::default()
        };
        let list = discovery(store, config).featured(&SurfaceQuery::new(10)).unwrap();
        assert_eq!(pairs(&list), vec![(id(3), id(31)), (id(1), id(11))]);
        assert_eq!(list[0].metrics.score, 8.0);
    }

    #[test]
    fn featured_empty_without_allow_list() {
        let store = CannedStore {
            totals: vec![totals(1, 11, 2, 2, 5)],
            ..CannedStore::default()
        };
        let list = discovery(store, DiscoveryConfig::default())
            .featured(&SurfaceQuery::new(10))
            .unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn featured_ties_break_on_recency() {
        let store = CannedStore {
            totals: vec![totals(1, 11, 2, 0, 30), totals(1, 12, 2, 0, 3)],
            ..CannedStore::default()
        };
        let config = DiscoveryConfig {
            featured_sources: vec![id(1)],
            ..DiscoveryConfig::default()
        };
        let list = discovery(store, config).featured(&SurfaceQuery::new(10)).unwrap();
        assert_eq!(pairs(&list), vec![(id(1), id(12)), (id(1), id(11))]);
    }

    #[test]
    fn recently_updated_window() {
        let store = CannedStore {
            totals: vec![totals(1, 11, 1, 0, 47), totals(2, 21, 1, 0, 49), totals(3, 31, 1, 0, 2)],
            ..CannedStore::default()
        };
        let list = discovery(store, DiscoveryConfig::default())
            .recently_updated(&SurfaceQuery::new(10))
            .unwrap();
        assert_eq!(pairs(&list), vec![(id(3), id(31)), (id(1), id(11))]);
    }

    #[test]
    fn most_documented_orders_by_items_then_votes() {
        let store = CannedStore {
            totals: vec![totals(1, 11, 3, 1, 1), totals(2, 21, 3, 9, 1), totals(3, 31, 0, 40, 1), totals(4, 41, 8, 0, 1)],
            ..CannedStore::default()
        };
        let list = discovery(store, DiscoveryConfig::default())
            .most_documented(&SurfaceQuery::new(2))
            .unwrap();
        assert_eq!(pairs(&list), vec![(id(4), id(41)), (id(2), id(21))]);
    }

    #[test]
    fn needs_help_uses_item_stats() {
        let store = CannedStore {
            stats: vec![ItemStats {
                item: ItemId::new(),
                comparison: comparison(1, 11),
                tally: VoteTally::new(2, 1, 2),
                live_comments: 0,
                updated_at: now(),
            }],
            ..CannedStore::default()
        };
        let help = discovery(store, DiscoveryConfig::default())
            .needs_help(&SurfaceQuery::new(5))
            .unwrap();
        assert_eq!(help.disputed.len(), 1);
        assert_eq!(help.undiscussed.len(), 1);
        assert_eq!(help.under_documented.len(), 1);
    }

    #[test]
    fn failing_surface_errors_directly() {
        let store = CannedStore {
            fail: true,
            ..CannedStore::default()
        };
        let d = discovery(store, DiscoveryConfig::default());
        assert!(d.trending(&SurfaceQuery::new(5), 7).is_err());
    }

    #[test]
    fn home_degrades_to_empty() {
        let store = CannedStore {
            fail: true,
            ..CannedStore::default()
        };
        let feed = discovery(store, DiscoveryConfig::default()).home(&SurfaceQuery::new(5));
        assert_eq!(feed, HomeFeed::default());
    }

    #[test]
    fn surface_query_spoiler_scope() {
        let q = SurfaceQuery::new(3).with_max_spoiler(SpoilerLevel::BookOnly);
        let scope = q.scope();
        assert!(scope.includes(SpoilerLevel::ScreenOnly));
        assert!(!scope.includes(SpoilerLevel::Full));
    }

    #[test]
    fn oversized_windows_mean_all_time() {
        let store = CannedStore {
            activity: vec![activity(1, 11, 2, 0, 2)],
            totals: vec![totals(1, 11, 2, 0, 24 * 365 * 50)],
            ..CannedStore::default()
        };
        let config = DiscoveryConfig {
            recent_window_hours: u32::MAX,
            ..DiscoveryConfig::default()
        };
        let discovery = discovery(store, config);

        let trending = discovery.trending(&SurfaceQuery::new(5), u32::MAX).unwrap();
        assert_eq!(pairs(&trending), vec![(id(1), id(11))]);
        let recent = discovery.recently_updated(&SurfaceQuery::new(5)).unwrap();
        assert_eq!(pairs(&recent), vec![(id(1), id(11))]);
    }

    #[test]
    fn window_start_saturates() {
        assert_eq!(window_start(now(), Duration::days(i64::from(u32::MAX))), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(now(), Duration::days(7)), now() - Duration::days(7));
    }
}
