//! Query dispatch across lexical, vector, hybrid and grounded modes.
//!
//! Hybrid mode over-fetches from both strategies, merges the two lists with
//! the configured [`MergeStrategy`], and truncates to the requested limit.

use std::collections::HashMap;

use lodestar_core::{HitKind, LodestarError, MergeStrategy, ScoredHit, SearchConfig, SearchMode};
use lodestar_index::embedding::tokenize;
use lodestar_index::lexical::{extract_snippet, LexicalHit};
use lodestar_index::store::IndexStore;

use crate::fusion::{max_score_merge, rrf_fusion, weighted_fusion};
use crate::vector::semantic_search;

/// External reranker for [`SearchMode::Grounded`].
///
/// Receives the hybrid candidates for a query and returns its own ranking.
/// Failures are not fatal: the caller logs them and keeps the hybrid result.
pub trait GroundedRetriever {
    /// Rerank `candidates` for `query`, returning at most `limit` hits.
    ///
    /// # Errors
    ///
    /// Any error; typically [`LodestarError::Collaborator`].
    fn retrieve(
        &self,
        query: &str,
        candidates: &[ScoredHit],
        limit: usize,
    ) -> Result<Vec<ScoredHit>, LodestarError>;
}

/// Search front end over one [`IndexStore`].
///
/// Holds no per-query state; every call reads the store afresh.
///
/// # Examples
///
/// ```
/// use lodestar_core::{SearchConfig, SearchMode};
/// use lodestar_index::fingerprint::Fingerprint;
/// use lodestar_index::store::IndexStore;
/// use lodestar_search::hybrid::HybridSearch;
///
/// let mut store = IndexStore::in_memory(64).unwrap();
/// store.upsert_file("db.rs", "fn connect_database() {}", &Fingerprint::new("1")).unwrap();
///
/// let search = HybridSearch::new(&store, SearchConfig::default());
/// let hits = search.search("connect_database", SearchMode::Hybrid, 5).unwrap();
/// assert_eq!(hits[0].path, "db.rs");
/// ```
pub struct HybridSearch<'a> {
    store: &'a IndexStore,
    config: SearchConfig,
    grounded: Option<Box<dyn GroundedRetriever + 'a>>,
}

impl<'a> HybridSearch<'a> {
    /// Create a search front end with no grounded retriever.
    pub fn new(store: &'a IndexStore, config: SearchConfig) -> Self {
        Self {
            store,
            config,
            grounded: None,
        }
    }

    /// Attach the reranker used by [`SearchMode::Grounded`].
    pub fn with_grounded(mut self, retriever: Box<dyn GroundedRetriever + 'a>) -> Self {
        self.grounded = Some(retriever);
        self
    }

    /// Run `query` in `mode`, returning at most `max(limit, 1)` hits.
    ///
    /// A query without tokens returns no hits in every mode.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] if the store cannot be read.
    /// A failing grounded retriever is not an error.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<ScoredHit>, LodestarError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.max(1);

        let hits = match mode {
            SearchMode::Lexical => self
                .store
                .search_fts(query, limit)?
                .into_iter()
                .map(|hit| ScoredHit {
                    path: hit.path,
                    score: hit.score,
                    kind: HitKind::Lexical,
                    snippet: hit.snippet,
                })
                .collect(),
            SearchMode::Vector => {
                let mut hits = Vec::new();
                for (path, score) in semantic_search(self.store, query, limit)? {
                    let snippet = self.snippet_for(&path, &tokens)?;
                    hits.push(ScoredHit {
                        path,
                        score: f64::from(score),
                        kind: HitKind::Vector,
                        snippet,
                    });
                }
                hits
            }
            SearchMode::Hybrid => self.hybrid(query, &tokens, limit)?,
            SearchMode::Grounded => self.grounded(query, &tokens, limit)?,
        };

        tracing::debug!(query, %mode, hits = hits.len(), "search complete");
        Ok(hits)
    }

    fn hybrid(
        &self,
        query: &str,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredHit>, LodestarError> {
        let fetch_count = limit.saturating_mul(self.config.candidate_multiplier.max(1));

        let lexical = self.store.search_fts(query, fetch_count)?;
        let vector = semantic_search(self.store, query, fetch_count)?;

        let lexical_scores: Vec<(String, f64)> = lexical
            .iter()
            .map(|hit| (hit.path.clone(), hit.score))
            .collect();
        let vector_scores: Vec<(String, f64)> = vector
            .into_iter()
            .map(|(path, score)| (path, f64::from(score)))
            .collect();

        let merged = match self.config.merge {
            MergeStrategy::Rrf => rrf_fusion(
                &[lexical_scores, vector_scores],
                self.config.rrf_k,
                Some(limit),
            ),
            MergeStrategy::Max => max_score_merge(&[lexical_scores, vector_scores], Some(limit)),
            MergeStrategy::Weighted => {
                let bm25: HashMap<String, f64> = lexical_scores.into_iter().collect();
                let dense: HashMap<String, f64> = vector_scores.into_iter().collect();
                weighted_fusion(
                    &bm25,
                    &dense,
                    self.config.bm25_weight,
                    self.config.dense_weight,
                    Some(limit),
                )
            }
        };

        let mut snippets: HashMap<String, Option<String>> = lexical
            .into_iter()
            .map(|LexicalHit { path, snippet, .. }| (path, snippet))
            .collect();

        let mut hits = Vec::with_capacity(merged.len());
        for (path, score) in merged {
            let snippet = match snippets.remove(&path).flatten() {
                Some(snippet) => Some(snippet),
                None => self.snippet_for(&path, tokens)?,
            };
            hits.push(ScoredHit {
                path,
                score,
                kind: HitKind::Fused,
                snippet,
            });
        }
        Ok(hits)
    }

    fn grounded(
        &self,
        query: &str,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredHit>, LodestarError> {
        let candidates = self.hybrid(query, tokens, limit)?;
        let Some(retriever) = &self.grounded else {
            tracing::warn!("no grounded retriever configured, using hybrid results");
            return Ok(candidates);
        };

        match retriever.retrieve(query, &candidates, limit) {
            Ok(mut hits) => {
                hits.truncate(limit);
                Ok(hits)
            }
            Err(e) => {
                tracing::warn!(error = %e, "grounded retrieval failed, using hybrid results");
                Ok(candidates)
            }
        }
    }

    fn snippet_for(&self, path: &str, tokens: &[String]) -> Result<Option<String>, LodestarError> {
        Ok(self
            .store
            .get_text(path)?
            .and_then(|text| extract_snippet(&text, tokens)))
    }
}
