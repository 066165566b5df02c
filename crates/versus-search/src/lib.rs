//! # versus-search: tiered relevance matching.
//!
//! Ranks works for a free-text query: disjoint score bands for exact,
//! prefix, whole-word, substring and summary matches, an additive creator
//! match, a capped popularity boost, and a bigram-similarity fallback when
//! too few candidates match any tier.

pub mod relevance;
pub mod text;

pub use relevance::{MatchKind, RelevanceMatcher, SearchHit, TierScore};
