//! Rank fusion: combine rankings from scorers whose scores are not comparable.
//!
//! Every function here is pure. Results are sorted by fused score descending
//! with ties broken by id ascending, so output order never depends on hash
//! iteration order. A `limit` of `Some(n)` truncates to `max(n, 1)` entries.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub use lodestar_core::DEFAULT_RRF_K;

/// Combine ranked lists with Reciprocal Rank Fusion.
///
/// `fused(id) = Σ 1 / (k + rank_L(id))` over every list `L` containing `id`,
/// with 1-based ranks. Only positions matter; input scores are ignored. An id
/// repeated within one list counts at its first position.
///
/// # Examples
///
/// ```
/// use lodestar_search::fusion::{rrf_fusion, DEFAULT_RRF_K};
///
/// let lexical = vec![("a", 1.0), ("b", 0.9)];
/// let vector = vec![("b", 0.5), ("a", 0.3)];
/// let fused = rrf_fusion(&[lexical, vector], DEFAULT_RRF_K, None);
///
/// let expected = 1.0 / 61.0 + 1.0 / 62.0;
/// assert_eq!(fused[0].0, "a");
/// assert!((fused[0].1 - expected).abs() < 1e-12);
/// assert!((fused[1].1 - expected).abs() < 1e-12);
/// ```
pub fn rrf_fusion<I, L>(lists: &[L], k: f64, limit: Option<usize>) -> Vec<(I, f64)>
where
    I: Clone + Eq + Hash + Ord,
    L: AsRef<[(I, f64)]>,
{
    let mut scores: HashMap<I, f64> = HashMap::new();

    for list in lists {
        let mut seen: HashSet<&I> = HashSet::new();
        let mut rank = 0usize;
        for (id, _score) in list.as_ref() {
            if !seen.insert(id) {
                continue;
            }
            rank += 1;
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank as f64);
        }
    }

    finish(scores, limit)
}

/// Linear combination of lexical and dense scores.
///
/// `fused(id) = w_bm25 · bm25[id] + w_dense · dense[id]`, a missing entry
/// contributing 0.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use lodestar_search::fusion::weighted_fusion;
///
/// let bm25 = HashMap::from([("x", 2.0)]);
/// let dense = HashMap::from([("y", 3.0)]);
/// let fused = weighted_fusion(&bm25, &dense, 1.0, 2.0, None);
/// assert_eq!(fused, vec![("y", 6.0), ("x", 2.0)]);
/// ```
pub fn weighted_fusion<I>(
    bm25: &HashMap<I, f64>,
    dense: &HashMap<I, f64>,
    w_bm25: f64,
    w_dense: f64,
    limit: Option<usize>,
) -> Vec<(I, f64)>
where
    I: Clone + Eq + Hash + Ord,
{
    let mut scores: HashMap<I, f64> = HashMap::new();
    for (id, score) in bm25 {
        *scores.entry(id.clone()).or_insert(0.0) += w_bm25 * score;
    }
    for (id, score) in dense {
        *scores.entry(id.clone()).or_insert(0.0) += w_dense * score;
    }
    finish(scores, limit)
}

/// Keep, per id, the highest raw score seen in any list.
///
/// Cheap, but compares scores on whatever scales the inputs use.
///
/// # Examples
///
/// ```
/// use lodestar_search::fusion::max_score_merge;
///
/// let merged = max_score_merge(&[vec![("a", 0.2), ("b", 3.0)], vec![("a", 0.9)]], None);
/// assert_eq!(merged, vec![("b", 3.0), ("a", 0.9)]);
/// ```
pub fn max_score_merge<I, L>(lists: &[L], limit: Option<usize>) -> Vec<(I, f64)>
where
    I: Clone + Eq + Hash + Ord,
    L: AsRef<[(I, f64)]>,
{
    let mut scores: HashMap<I, f64> = HashMap::new();
    for list in lists {
        for (id, score) in list.as_ref() {
            scores
                .entry(id.clone())
                .and_modify(|best| *best = best.max(*score))
                .or_insert(*score);
        }
    }
    finish(scores, limit)
}

fn finish<I: Ord>(scores: HashMap<I, f64>, limit: Option<usize>) -> Vec<(I, f64)> {
    let mut combined: Vec<(I, f64)> = scores.into_iter().collect();
    combined.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some(n) = limit {
        combined.truncate(n.max(1));
    }
    combined
}
