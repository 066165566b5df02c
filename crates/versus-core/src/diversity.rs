//! Post-ranking diversity pass.
//!
//! Caps how many results may share a grouping key (e.g. the same source
//! book) while keeping the ranked order intact.

use std::collections::HashMap;
use std::hash::Hash;

/// Walk `ranked` in order, keeping an entry only while its group has fewer
/// than `max_per_group` accepted entries, and stop once `limit` entries are
/// kept.
///
/// The output is an order-preserving subsequence of the input. Skipped
/// entries are only excluded from this result. `max_per_group == 0` means
/// the groups are uncapped.
///
/// # Examples
///
/// ```
/// use versus_core::diversity::diversify;
///
/// let ranked = vec![("dune", 1), ("dune", 2), ("dune", 3), ("emma", 4)];
/// let kept = diversify(ranked, |(book, _)| *book, 2, 10);
/// assert_eq!(kept, vec![("dune", 1), ("dune", 2), ("emma", 4)]);
/// ```
pub fn diversify<T, K, F>(ranked: Vec<T>, key: F, max_per_group: usize, limit: usize) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut accepted: HashMap<K, usize> = HashMap::new();
    let mut out = Vec::with_capacity(limit.min(ranked.len()));

    for entry in ranked {
        if out.len() >= limit {
            break;
        }
        let count = accepted.entry(key(&entry)).or_insert(0);
        if max_per_group > 0 && *count >= max_per_group {
            continue;
        }
        *count += 1;
        out.push(entry);
    }

    out
}
