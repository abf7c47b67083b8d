//! Lexical, semantic, and hybrid retrieval over a Lodestar index.
//!
//! [`hybrid::HybridSearch`] dispatches a query by [`SearchMode`]: keyword
//! search, exact cosine scan over stored embeddings, or both merged with
//! Reciprocal Rank Fusion (or another configured [`fusion`] strategy).
//!
//! [`build`] and [`search`] open the repository's index themselves, for
//! callers that do not want to manage an [`IndexStore`] handle.

pub mod fusion;
pub mod hybrid;
pub mod vector;

use std::path::Path;

use lodestar_core::{IndexStats, LodestarConfig, LodestarError, ScoredHit, SearchMode};
use lodestar_index::build::BuildOptions;
use lodestar_index::store::IndexStore;

use crate::hybrid::HybridSearch;

/// Incrementally index `paths` under `repo_root`, pruning anything else.
///
/// # Errors
///
/// Returns [`LodestarError::StoreUnavailable`] if the index cannot be opened,
/// or [`LodestarError::Database`] if a write fails.
///
/// # Examples
///
/// ```
/// use lodestar_core::LodestarConfig;
///
/// let repo = tempfile::tempdir().unwrap();
/// std::fs::write(repo.path().join("main.rs"), "fn main() {}").unwrap();
///
/// let stats = lodestar_search::build(repo.path(), &["main.rs"], &LodestarConfig::default()).unwrap();
/// assert_eq!(stats.files_updated, 1);
/// ```
pub fn build<P: AsRef<Path>>(
    repo_root: &Path,
    paths: &[P],
    config: &LodestarConfig,
) -> Result<IndexStats, LodestarError> {
    let mut store = IndexStore::open_for_repo(repo_root, &config.index)?;
    store.build(repo_root, paths, &BuildOptions::from(&config.index))
}

/// Query the index under `repo_root`.
///
/// Opens the index read-only; a repository that has never been indexed
/// yields no hits and is left untouched.
///
/// # Errors
///
/// Returns [`LodestarError::StoreUnavailable`] if the index cannot be opened,
/// or [`LodestarError::Database`] if it cannot be read.
pub fn search(
    repo_root: &Path,
    query: &str,
    mode: SearchMode,
    limit: usize,
    config: &LodestarConfig,
) -> Result<Vec<ScoredHit>, LodestarError> {
    let Some(store) = IndexStore::open_read_only_for_repo(repo_root, &config.index)? else {
        return Ok(Vec::new());
    };
    let hits = HybridSearch::new(&store, config.search.clone()).search(query, mode, limit);
    hits
}
