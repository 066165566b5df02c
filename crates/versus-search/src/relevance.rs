//! Tiered relevance matching with a fuzzy fallback.
//!
//! Title tiers, highest first (default bands):
//!
//! | Tier                              | Band |
//! |-----------------------------------|------|
//! | exact (case-insensitive)          | 100  |
//! | prefix followed by word boundary  | 70   |
//! | whole word anywhere               | 50   |
//! | substring anywhere                | 30   |
//! | summary contains the query        | 10   |
//!
//! The creator field (author or director) repeats the first four tiers at
//! `creator_factor` of the title bands and adds to the title score. The
//! popularity boost sits on top and is capped below the smallest gap between
//! bands, so popularity can reorder candidates within a tier but never lift
//! one over a stronger tier.
//!
//! When fewer than `fuzzy_min_hits` candidates clear any tier, candidates
//! with no tier match are scored by bigram similarity against title and
//! creator instead and kept above `fuzzy_threshold`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use versus_core::config::SearchConfig;
use versus_core::score::{by_score_desc, popularity_boost};
use versus_core::types::{SearchCandidate, WorkRef};

use crate::text::{classify, contains_word, normalize, FieldMatch};

/// Strongest reason a candidate was returned.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Prefix,
    WholeWord,
    Substring,
    Summary,
    Fuzzy,
}

impl From<FieldMatch> for MatchKind {
    fn from(m: FieldMatch) -> Self {
        match m {
            FieldMatch::Exact => MatchKind::Exact,
            FieldMatch::Prefix => MatchKind::Prefix,
            FieldMatch::WholeWord => MatchKind::WholeWord,
            FieldMatch::Substring => MatchKind::Substring,
        }
    }
}

/// One ranked search result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub work: WorkRef,
    pub creator: Option<String>,
    pub score: f64,
    pub match_kind: MatchKind,
    /// Whether the creator field contributed to the score.
    pub creator_matched: bool,
    /// Similarity for fuzzy hits.
    pub similarity: Option<f64>,
    pub popularity: f64,
    pub updated_at: DateTime<Utc>,
}

/// Tier score of one candidate before the popularity boost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierScore {
    pub score: f64,
    pub kind: MatchKind,
    pub creator_matched: bool,
}

/// Ranks search candidates for a query.
#[derive(Debug, Clone, Default)]
pub struct RelevanceMatcher {
    config: SearchConfig,
}

impl RelevanceMatcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn band(&self, m: FieldMatch) -> f64 {
        let tiers = &self.config.tiers;
        match m {
            FieldMatch::Exact => tiers.exact,
            FieldMatch::Prefix => tiers.prefix,
            FieldMatch::WholeWord => tiers.whole_word,
            FieldMatch::Substring => tiers.substring,
        }
    }

    /// Tier score for a normalized query, or `None` when no tier matches.
    pub fn tier_score(&self, query: &str, candidate: &SearchCandidate) -> Option<TierScore> {
        let allow_substring = query.chars().count() >= self.config.min_substring_len;

        let title = classify(&normalize(&candidate.work.title), query, allow_substring);
        let creator = candidate
            .creator
            .as_deref()
            .and_then(|c| classify(&normalize(c), query, allow_substring));

        let (mut score, kind) = match title {
            Some(m) => (self.band(m), Some(MatchKind::from(m))),
            None => {
                let summary_hit = candidate.summary.as_deref().is_some_and(|s| {
                    let s = normalize(s);
                    if allow_substring {
                        s.contains(query)
                    } else {
                        contains_word(&s, query)
                    }
                });
                if summary_hit {
                    (self.config.tiers.summary, Some(MatchKind::Summary))
                } else {
                    (0.0, None)
                }
            }
        };

        if let Some(m) = creator {
            score += self.band(m) * self.config.creator_factor;
        }

        let kind = match (kind, creator) {
            (Some(MatchKind::Summary), Some(m)) => MatchKind::from(m),
            (Some(kind), _) => kind,
            (None, Some(m)) => MatchKind::from(m),
            (None, None) => return None,
        };

        Some(TierScore {
            score,
            kind,
            creator_matched: creator.is_some(),
        })
    }

    /// Best bigram similarity of the query against title and creator.
    pub fn similarity(&self, query: &str, candidate: &SearchCandidate) -> f64 {
        let title = strsim::sorensen_dice(query, &normalize(&candidate.work.title));
        let creator = candidate
            .creator
            .as_deref()
            .map(|c| strsim::sorensen_dice(query, &normalize(c)))
            .unwrap_or(0.0);
        title.max(creator)
    }

    /// Rank `candidates` for `query`, best first, at most `limit` hits.
    ///
    /// Queries shorter than `min_query_len` return no hits.
    pub fn rank(&self, query: &str, candidates: &[SearchCandidate], limit: usize) -> Vec<SearchHit> {
        let query = normalize(query);
        if query.chars().count() < self.config.min_query_len {
            debug!(query = %query, "search: query below minimum length");
            return Vec::new();
        }

        let mut hits = Vec::new();
        let mut unmatched = Vec::new();
        for candidate in candidates {
            match self.tier_score(&query, candidate) {
                Some(tier) => hits.push(self.hit(candidate, tier.score, tier.kind, tier.creator_matched, None)),
                None => unmatched.push(candidate),
            }
        }

        hits.sort_by(compare_hits);

        // Fuzzy hits rank after every tiered hit, whatever their score.
        if hits.len() < self.config.fuzzy_min_hits {
            let mut fuzzy: Vec<SearchHit> = unmatched
                .into_iter()
                .filter_map(|candidate| {
                    let similarity = self.similarity(&query, candidate);
                    (similarity >= self.config.fuzzy_threshold).then(|| {
                        let score = similarity * self.config.fuzzy_weight;
                        self.hit(candidate, score, MatchKind::Fuzzy, false, Some(similarity))
                    })
                })
                .collect();
            fuzzy.sort_by(compare_hits);
            debug!(query = %query, tiered = hits.len(), fuzzy = fuzzy.len(), "search: fuzzy fallback");
            hits.extend(fuzzy);
        }

        hits.truncate(limit);
        hits
    }

    fn hit(
        &self,
        candidate: &SearchCandidate,
        base: f64,
        kind: MatchKind,
        creator_matched: bool,
        similarity: Option<f64>,
    ) -> SearchHit {
        SearchHit {
            work: candidate.work.clone(),
            creator: candidate.creator.clone(),
            score: base + popularity_boost(candidate.popularity, &self.config.boost),
            match_kind: kind,
            creator_matched,
            similarity,
            popularity: candidate.popularity,
            updated_at: candidate.updated_at,
        }
    }
}

/// Score desc, then most recently updated, then title for a stable order.
fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    by_score_desc(a.score, b.score)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.work.title.cmp(&b.work.title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use versus_core::types::{WorkId, WorkKind};

    fn candidate(title: &str, creator: Option<&str>, popularity: f64) -> SearchCandidate {
        SearchCandidate {
            work: WorkRef {
                id: WorkId::new(),
                title: title.to_string(),
                slug: title.to_lowercase().replace(' ', "-"),
                kind: WorkKind::Book,
            },
            creator: creator.map(str::to_string),
            summary: None,
            popularity,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn titles(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.work.title.as_str()).collect()
    }

    #[test]
    fn tier_precedence_for_short_query() {
        let matcher = RelevanceMatcher::default();
        let candidates = vec![
            candidate("Spitfire", None, 0.0),
            candidate("The It Crowd", None, 0.0),
            candidate("It Ends with Us", None, 0.0),
            candidate("It", None, 0.0),
        ];
        let hits = matcher.rank("it", &candidates, 10);
        assert_eq!(titles(&hits), vec!["It", "It Ends with Us", "The It Crowd"]);
        assert_eq!(hits[0].match_kind, MatchKind::Exact);
        assert_eq!(hits[1].match_kind, MatchKind::Prefix);
        assert_eq!(hits[2].match_kind, MatchKind::WholeWord);
    }

    #[test]
    fn substring_tier_for_longer_query() {
        let matcher = RelevanceMatcher::default();
        let candidates = vec![candidate("Spitfire", None, 0.0)];
        let tier = matcher.tier_score("pitf", &candidates[0]).unwrap();
        assert_eq!(tier.kind, MatchKind::Substring);
        assert_eq!(tier.score, 30.0);
    }

    #[test]
    fn creator_match_adds_scaled_band() {
        let matcher = RelevanceMatcher::default();
        let c = candidate("Carrie", Some("Stephen King"), 0.0);
        let tier = matcher.tier_score("carrie", &c).unwrap();
        assert_eq!(tier.score, 100.0);
        let tier = matcher.tier_score("stephen king", &c).unwrap();
        assert!((tier.score - 60.0).abs() < 1e-9);
        assert!(tier.creator_matched);
        assert_eq!(tier.kind, MatchKind::Exact);
        let c = candidate("King Rat", Some("King"), 0.0);
        let tier = matcher.tier_score("king", &c).unwrap();
        assert!((tier.score - 130.0).abs() < 1e-9);
    }

    #[test]
    fn summary_is_lowest_band() {
        let matcher = RelevanceMatcher::default();
        let mut c = candidate("Rebecca", None, 0.0);
        c.summary = Some("A gothic tale set at Manderley".into());
        let tier = matcher.tier_score("manderley", &c).unwrap();
        assert_eq!(tier.kind, MatchKind::Summary);
        assert_eq!(tier.score, 10.0);
    }

    #[test]
    fn short_query_returns_nothing() {
        let matcher = RelevanceMatcher::default();
        let hits = matcher.rank(" i ", &[candidate("I", None, 0.0)], 10);
        assert!(hits.is_empty());
    }

    #[test]
    fn popularity_breaks_ties_within_tier() {
        let matcher = RelevanceMatcher::default();
        let candidates = vec![
            candidate("Dune Messiah", None, 2.0),
            candidate("Dune Chronicles", None, 400.0),
        ];
        let hits = matcher.rank("dune", &candidates, 10);
        assert_eq!(titles(&hits), vec!["Dune Chronicles", "Dune Messiah"]);
    }

    #[test]
    fn recency_breaks_exact_ties() {
        let matcher = RelevanceMatcher::default();
        let older = candidate("Emma", None, 0.0);
        let mut newer = candidate("Emma", None, 0.0);
        newer.updated_at = older.updated_at + Duration::days(3);
        let newer_id = newer.work.id;
        let hits = matcher.rank("emma", &[older, newer], 10);
        assert_eq!(hits[0].work.id, newer_id);
    }

    #[test]
    fn fuzzy_fallback_for_typos() {
        let matcher = RelevanceMatcher::default();
        let candidates = vec![
            candidate("The Shining", Some("Stephen King"), 10.0),
            candidate("Persuasion", Some("Jane Austen"), 10.0),
        ];
        let hits = matcher.rank("shinning", &candidates, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].match_kind, MatchKind::Fuzzy);
        assert!(hits[0].similarity.unwrap() >= 0.2);
        assert_eq!(hits[0].work.title, "The Shining");
    }

    #[test]
    fn fuzzy_never_outranks_tiered_hits() {
        let matcher = RelevanceMatcher::default();
        let candidates = vec![
            candidate("Jaws", None, 0.0),
            candidate("Jawbreaker", None, 10_000.0),
        ];
        let hits = matcher.rank("jaws", &candidates, 10);
        assert_eq!(hits[0].work.title, "Jaws");
        assert_eq!(hits[0].match_kind, MatchKind::Exact);
        assert!(hits.iter().skip(1).all(|h| h.match_kind == MatchKind::Fuzzy));
    }

    #[test]
    fn no_fallback_with_enough_hits() {
        let matcher = RelevanceMatcher::default();
        let candidates = vec![
            candidate("Love Actually", None, 0.0),
            candidate("Love Story", None, 0.0),
            candidate("Love, Rosie", None, 0.0),
            candidate("Lovely Bones", None, 0.0),
            candidate("Glove", None, 0.0),
        ];
        let hits = matcher.rank("love", &candidates, 10);
        assert!(hits.iter().all(|h| h.match_kind != MatchKind::Fuzzy));
    }

    #[test]
    fn limit_applies() {
        let matcher = RelevanceMatcher::default();
        let candidates: Vec<_> = (0..10).map(|i| candidate(&format!("Bond {i}"), None, 0.0)).collect();
        assert_eq!(matcher.rank("bond", &candidates, 3).len(), 3);
    }

    proptest! {
        #[test]
        fn exact_beats_substring_regardless_of_popularity(
            exact_pop in 0.0f64..1e9,
            sub_pop in 0.0f64..1e9,
        ) {
            let matcher = RelevanceMatcher::default();
            let exact = candidate("Ender", None, exact_pop);
            let sub = candidate("Surrender Game", None, sub_pop);
            let hits = matcher.rank("ender", &[sub, exact], 10);
            prop_assert_eq!(hits[0].work.title.as_str(), "Ender");
            prop_assert!(hits[0].score > hits[1].score);
        }
    }
}
