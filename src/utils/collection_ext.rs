//! Collection helpers shared by the miners and the ranker.

use std::collections::HashMap;
use std::hash::Hash;

/// Deduplicate while preserving first-seen order.
#[inline]
pub fn unique_ordered<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Count occurrences of each key produced by `key_fn`.
///
/// # Example
/// ```ignore
/// let counts = count_by(candidates.iter(), |c| c.timezone);
/// ```
#[inline]
pub fn count_by<T, K, I, F>(items: I, key_fn: F) -> HashMap<K, usize>
where
    K: Eq + Hash,
    I: Iterator<Item = T>,
    F: Fn(&T) -> K,
{
    let mut map: HashMap<K, usize> = HashMap::new();
    for item in items {
        *map.entry(key_fn(&item)).or_default() += 1;
    }
    map
}

/// Top `n` entries of a count map, most frequent first. Ties break on the
/// key so the order is stable across runs.
pub fn top_n_by_count<K: Ord + Clone>(counts: &HashMap<K, usize>, n: usize) -> Vec<(K, usize)> {
    let mut entries: Vec<(K, usize)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

/// Percentile over an unsorted slice (nearest-rank). Returns `None` for an
/// empty slice.
pub fn percentile(values: &[u64], pct: f64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}
