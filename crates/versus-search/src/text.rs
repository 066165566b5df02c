//! Case-insensitive field matching helpers.
//!
//! A word boundary is any position next to a non-alphanumeric character or
//! at either end of the field.

/// Trim, lowercase and collapse inner whitespace.
///
/// ```
/// use versus_search::text::normalize;
///
/// assert_eq!(normalize("  The   IT Crowd "), "the it crowd");
/// ```
pub fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How a query matched one text field, strongest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldMatch {
    Exact,
    Prefix,
    WholeWord,
    Substring,
}

fn is_boundary(c: Option<char>) -> bool {
    c.is_none_or(|c| !c.is_alphanumeric())
}

/// Whether `query` occurs in `field` delimited by word boundaries on both
/// sides. Both inputs must already be normalized.
pub fn contains_word(field: &str, query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    field.match_indices(query).any(|(start, matched)| {
        let before = field[..start].chars().next_back();
        let after = field[start + matched.len()..].chars().next();
        is_boundary(before) && is_boundary(after)
    })
}

/// Classify how `query` matches `field`. Both inputs must already be
/// normalized.
///
/// With `allow_substring == false` only boundary-aligned matches count, so
/// short queries do not hit the inside of unrelated words.
pub fn classify(field: &str, query: &str, allow_substring: bool) -> Option<FieldMatch> {
    if query.is_empty() || field.is_empty() {
        return None;
    }
    if field == query {
        return Some(FieldMatch::Exact);
    }
    if field.starts_with(query) && is_boundary(field[query.len()..].chars().next()) {
        return Some(FieldMatch::Prefix);
    }
    if contains_word(field, query) {
        return Some(FieldMatch::WholeWord);
    }
    if allow_substring && field.contains(query) {
        return Some(FieldMatch::Substring);
    }
    None
}
