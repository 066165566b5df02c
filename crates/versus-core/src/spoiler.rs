//! Spoiler classification and viewer tolerance filtering.
//!
//! Levels are ordered by how much they reveal. `BookOnly` and `ScreenOnly`
//! are siblings at the same ordinal: each spoils one side of a comparison,
//! both sit above `None` and below `Full`.
//!
//! | Level        | Ordinal |
//! |--------------|---------|
//! | `None`       | 0       |
//! | `BookOnly`   | 1       |
//! | `ScreenOnly` | 1       |
//! | `Full`       | 2       |

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Spoiler classification of a diff or comment.
///
/// The derived `Ord` only gives sets a stable iteration order; compare
/// levels by [`SpoilerLevel::ordinal`].
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SpoilerLevel {
    #[default]
    None,
    #[serde(alias = "book-only")]
    BookOnly,
    #[serde(alias = "screen-only")]
    ScreenOnly,
    Full,
}

impl SpoilerLevel {
    pub const ALL: [SpoilerLevel; 4] = [
        SpoilerLevel::None,
        SpoilerLevel::BookOnly,
        SpoilerLevel::ScreenOnly,
        SpoilerLevel::Full,
    ];

    /// Ordinal level of this classification.
    ///
    /// # Examples
    ///
    /// ```
    /// use versus_core::spoiler::SpoilerLevel;
    ///
    /// assert_eq!(SpoilerLevel::None.ordinal(), 0);
    /// assert_eq!(SpoilerLevel::BookOnly.ordinal(), SpoilerLevel::ScreenOnly.ordinal());
    /// assert_eq!(SpoilerLevel::Full.ordinal(), 2);
    /// ```
    pub fn ordinal(self) -> u8 {
        match self {
            SpoilerLevel::None => 0,
            SpoilerLevel::BookOnly | SpoilerLevel::ScreenOnly => 1,
            SpoilerLevel::Full => 2,
        }
    }

    /// Parse a classification from request input.
    ///
    /// Unrecognized input degrades to [`SpoilerLevel::None`] so a malformed
    /// filter shows only the safest content instead of failing the request.
    ///
    /// ```
    /// use versus_core::spoiler::SpoilerLevel;
    ///
    /// assert_eq!(SpoilerLevel::parse("book-only"), SpoilerLevel::BookOnly);
    /// assert_eq!(SpoilerLevel::parse(" FULL "), SpoilerLevel::Full);
    /// assert_eq!(SpoilerLevel::parse("everything"), SpoilerLevel::None);
    /// ```
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => SpoilerLevel::None,
            "book_only" => SpoilerLevel::BookOnly,
            "screen_only" => SpoilerLevel::ScreenOnly,
            "full" => SpoilerLevel::Full,
            other => {
                debug!(input = other, "spoiler: unrecognized level, using none");
                SpoilerLevel::None
            }
        }
    }
}

/// Every classification a viewer with tolerance `max` may see.
pub fn allowed_set(max: SpoilerLevel) -> BTreeSet<SpoilerLevel> {
    let ceiling = max.ordinal();
    SpoilerLevel::ALL
        .into_iter()
        .filter(|level| level.ordinal() <= ceiling)
        .collect()
}

/// Which diffs an aggregate query should include.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemScope {
    spoilers: BTreeSet<SpoilerLevel>,
}

impl ItemScope {
    /// Scope for a viewer whose tolerance is `max`.
    pub fn up_to(max: SpoilerLevel) -> Self {
        Self {
            spoilers: allowed_set(max),
        }
    }

    /// No spoiler restriction.
    pub fn all() -> Self {
        Self::up_to(SpoilerLevel::Full)
    }

    pub fn includes(&self, level: SpoilerLevel) -> bool {
        self.spoilers.contains(&level)
    }

    pub fn spoilers(&self) -> &BTreeSet<SpoilerLevel> {
        &self.spoilers
    }
}

impl Default for ItemScope {
    fn default() -> Self {
        Self::all()
    }
}
