//! Book-vs-adaptation preference statistics.
//!
//! Only confirmed votes (voter read the book and watched the adaptation)
//! contribute. Unconfirmed votes are stored but ignored here.

use serde::{Deserialize, Serialize};

use crate::types::{ComparisonVote, Preference};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PreferenceSummary {
    pub book: u64,
    pub screen: u64,
    pub tie: u64,
    /// Confirmed votes counted above.
    pub confirmed_votes: u64,
    /// Votes stored but left out for missing confirmations.
    pub unconfirmed_votes: u64,
    /// Mean faithfulness over confirmed votes that carried a rating.
    pub average_faithfulness: Option<f64>,
}

impl PreferenceSummary {
    /// Share of confirmed votes preferring the book, as a percentage.
    pub fn book_percent(&self) -> Option<u8> {
        percent(self.book, self.confirmed_votes)
    }

    pub fn screen_percent(&self) -> Option<u8> {
        percent(self.screen, self.confirmed_votes)
    }
}

fn percent(part: u64, whole: u64) -> Option<u8> {
    (whole > 0).then(|| ((part as f64 / whole as f64) * 100.0).round() as u8)
}

/// Fold comparison votes into a summary.
pub fn summarize(votes: &[ComparisonVote]) -> PreferenceSummary {
    let mut summary = PreferenceSummary::default();
    let mut rating_sum = 0u64;
    let mut rated = 0u64;

    for vote in votes {
        if !vote.is_confirmed() {
            summary.unconfirmed_votes += 1;
            continue;
        }
        summary.confirmed_votes += 1;
        match vote.preference {
            Preference::Book => summary.book += 1,
            Preference::Screen => summary.screen += 1,
            Preference::Tie => summary.tie += 1,
        }
        if let Some(rating) = vote.faithfulness.filter(|r| (1..=5).contains(r)) {
            rating_sum += u64::from(rating);
            rated += 1;
        }
    }

    if rated > 0 {
        summary.average_faithfulness = Some(rating_sum as f64 / rated as f64);
    }
    summary
}
