//! Nearest-neighbour search over stored embeddings.

use lodestar_core::LodestarError;
use lodestar_index::embedding::{cosine, embed_text};
use lodestar_index::store::IndexStore;

/// Source of nearest neighbours for a query vector.
///
/// [`ExactScan`] compares against every stored vector; an approximate index
/// can implement this trait without changing any caller.
pub trait VectorIndex {
    /// The `top_k` paths most similar to `query`, best first, ties by path.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] if stored vectors cannot be read.
    fn nearest(&self, query: &[f32], top_k: usize) -> Result<Vec<(String, f32)>, LodestarError>;
}

/// Brute-force cosine scan over an [`IndexStore`].
///
/// # Examples
///
/// ```
/// use lodestar_index::embedding::embed_text;
/// use lodestar_index::fingerprint::Fingerprint;
/// use lodestar_index::store::IndexStore;
/// use lodestar_search::vector::{ExactScan, VectorIndex};
///
/// let mut store = IndexStore::in_memory(64).unwrap();
/// store.upsert_file("a.rs", "open database connection", &Fingerprint::new("1")).unwrap();
///
/// let query = embed_text("database connection", 64);
/// let hits = ExactScan::new(&store).nearest(&query, 5).unwrap();
/// assert_eq!(hits[0].0, "a.rs");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExactScan<'a> {
    store: &'a IndexStore,
}

impl<'a> ExactScan<'a> {
    /// Scan the embeddings held by `store`.
    pub fn new(store: &'a IndexStore) -> Self {
        Self { store }
    }
}

impl VectorIndex for ExactScan<'_> {
    fn nearest(&self, query: &[f32], top_k: usize) -> Result<Vec<(String, f32)>, LodestarError> {
        let mut scored = Vec::new();
        self.store.for_each_embedding(|path, vector| {
            scored.push((path.to_string(), cosine(query, vector)));
        })?;

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k.max(1));
        Ok(scored)
    }
}

/// Embed `query` and return the `top_k` most similar stored files.
///
/// A query with no tokens embeds to the zero vector and returns nothing.
///
/// # Errors
///
/// Returns [`LodestarError::Database`] on store failure.
pub fn semantic_search(
    store: &IndexStore,
    query: &str,
    top_k: usize,
) -> Result<Vec<(String, f32)>, LodestarError> {
    let vector = embed_text(query, store.dimensions());
    if vector.iter().all(|x| *x == 0.0) {
        return Ok(Vec::new());
    }
    ExactScan::new(store).nearest(&vector, top_k)
}
