//! Keyword search over stored file text.
//!
//! The FTS5 index answers first. When it has nothing (for example a query
//! token that only appears inside a longer identifier), a substring scan over
//! the raw text ranks files by how often the query tokens occur.

use std::cmp::Ordering;

use lodestar_core::LodestarError;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::embedding::tokenize;
use crate::store::{db, IndexStore};

/// Snippets are cut to this many characters.
pub const MAX_SNIPPET_CHARS: usize = 160;

/// One keyword match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalHit {
    /// Repository-relative path.
    pub path: String,
    /// Higher is better; always positive.
    pub score: f64,
    /// First matching line of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl IndexStore {
    /// Rank stored files against `query` by keyword relevance.
    ///
    /// Returns at most `max(limit, 1)` hits, best first, ties broken by path.
    /// A query without tokens returns no hits.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use lodestar_index::fingerprint::Fingerprint;
    /// use lodestar_index::store::IndexStore;
    ///
    /// let mut store = IndexStore::in_memory(32).unwrap();
    /// let body = "fn process_payment(amount: u64) {}";
    /// store.upsert_file("pay.rs", body, &Fingerprint::of_content(body.as_bytes())).unwrap();
    ///
    /// let hits = store.search_fts("process_payment", 5).unwrap();
    /// assert_eq!(hits[0].path, "pay.rs");
    /// assert!(hits[0].score > 0.0);
    /// ```
    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>, LodestarError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.max(1);

        let hits = self.match_fts(&tokens, limit)?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        tracing::debug!(query, "no inverted-index match, scanning stored text");
        self.match_substrings(&tokens, limit)
    }

    fn match_fts(&self, tokens: &[String], limit: usize) -> Result<Vec<LexicalHit>, LodestarError> {
        let expression = tokens
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ");

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT d.path, d.body, documents_fts.rank
                 FROM documents_fts
                 JOIN documents d ON d.id = documents_fts.rowid
                 WHERE documents_fts MATCH ?1
                 ORDER BY documents_fts.rank, d.path
                 LIMIT ?2",
            )
            .map_err(|e| db("failed to prepare FTS query", e))?;

        let rows = stmt
            .query_map(params![expression, limit as i64], |row| {
                let path: String = row.get(0)?;
                let body: String = row.get(1)?;
                let rank: f64 = row.get(2)?;
                Ok((path, body, rank))
            })
            .map_err(|e| db("FTS query failed", e))?;

        let mut hits = Vec::new();
        for row in rows {
            let (path, body, rank) = row.map_err(|e| db("failed to read FTS row", e))?;
            // FTS5 rank is negative (more negative = more relevant)
            hits.push(LexicalHit {
                path,
                score: (-rank).max(f64::MIN_POSITIVE),
                snippet: extract_snippet(&body, tokens),
            });
        }
        Ok(hits)
    }

    fn match_substrings(
        &self,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<LexicalHit>, LodestarError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT path, body FROM documents ORDER BY path")
            .map_err(|e| db("failed to prepare text scan", e))?;
        let mut rows = stmt.query([]).map_err(|e| db("text scan failed", e))?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().map_err(|e| db("failed to read row", e))? {
            let path: String = row.get(0).map_err(|e| db("failed to read path", e))?;
            let body: String = row.get(1).map_err(|e| db("failed to read body", e))?;
            let haystack = body.to_lowercase();
            let count: usize = tokens
                .iter()
                .map(|t| haystack.matches(t.as_str()).count())
                .sum();
            if count > 0 {
                hits.push(LexicalHit {
                    path,
                    score: count as f64,
                    snippet: extract_snippet(&body, tokens),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

/// First line of `body` containing any of `tokens` (case-insensitive),
/// trimmed and cut to [`MAX_SNIPPET_CHARS`].
///
/// Falls back to the first non-blank line; `None` for blank text.
///
/// # Examples
///
/// ```
/// use lodestar_index::lexical::extract_snippet;
///
/// let body = "use std::io;\n\n    fn parseRequest() {}\n";
/// let snippet = extract_snippet(body, &["parserequest".to_string()]);
/// assert_eq!(snippet.as_deref(), Some("fn parseRequest() {}"));
/// ```
pub fn extract_snippet(body: &str, tokens: &[String]) -> Option<String> {
    let matching = body.lines().find(|line| {
        let lower = line.to_lowercase();
        tokens.iter().any(|t| lower.contains(t.as_str()))
    });
    let line = matching.or_else(|| body.lines().find(|l| !l.trim().is_empty()))?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_SNIPPET_CHARS).collect())
}
