use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single ranked result returned by a query.
///
/// Produced per query and never persisted.
///
/// # Examples
///
/// ```
/// use lodestar_core::{HitKind, ScoredHit};
///
/// let hit = ScoredHit {
///     path: "src/db.rs".into(),
///     score: 0.92,
///     kind: HitKind::Lexical,
///     snippet: Some("fn connect() {".into()),
/// };
/// assert!(hit.score > 0.9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    /// Repository-relative path of the matched file.
    pub path: String,
    /// Relevance score. Always finite; scale depends on `kind`.
    pub score: f64,
    /// Which retrieval strategy produced the score.
    pub kind: HitKind,
    /// A line of the file that matched the query, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Retrieval strategy that produced a [`ScoredHit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    /// Full-text match.
    Lexical,
    /// Embedding cosine similarity.
    Vector,
    /// Combination of several rankings.
    Fused,
}

impl fmt::Display for HitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitKind::Lexical => write!(f, "lexical"),
            HitKind::Vector => write!(f, "vector"),
            HitKind::Fused => write!(f, "fused"),
        }
    }
}

/// Query dispatch mode.
///
/// # Examples
///
/// ```
/// use lodestar_core::SearchMode;
///
/// let mode: SearchMode = "vector".parse().unwrap();
/// assert_eq!(mode, SearchMode::Vector);
/// assert_eq!(SearchMode::default(), SearchMode::Hybrid);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Full-text search only.
    Lexical,
    /// Embedding search only.
    Vector,
    /// Both, merged.
    #[default]
    Hybrid,
    /// Hybrid candidates reranked by an external collaborator.
    Grounded,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Lexical => write!(f, "lexical"),
            SearchMode::Vector => write!(f, "vector"),
            SearchMode::Hybrid => write!(f, "hybrid"),
            SearchMode::Grounded => write!(f, "grounded"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexical" | "keyword" | "fts" => Ok(SearchMode::Lexical),
            "vector" | "semantic" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            "grounded" => Ok(SearchMode::Grounded),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// How the hybrid mode combines its lexical and vector result lists.
///
/// Lexical (BM25) and cosine scores live on unrelated scales, so the
/// rank-based [`Rrf`](MergeStrategy::Rrf) is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Reciprocal Rank Fusion.
    #[default]
    Rrf,
    /// Per path, keep the highest raw score from either list.
    Max,
    /// Weighted sum of raw scores.
    Weighted,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Rrf => write!(f, "rrf"),
            MergeStrategy::Max => write!(f, "max"),
            MergeStrategy::Weighted => write!(f, "weighted"),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rrf" => Ok(MergeStrategy::Rrf),
            "max" => Ok(MergeStrategy::Max),
            "weighted" => Ok(MergeStrategy::Weighted),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

/// Why a candidate file was left out of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The file could not be opened or read.
    Io {
        /// Underlying I/O error message.
        message: String,
    },
    /// The file exceeds the configured size limit.
    TooLarge {
        /// Actual size in bytes.
        bytes: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
    /// A NUL byte was found near the start of the file.
    Binary,
    /// The bytes are not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Io { message } => write!(f, "read failed: {message}"),
            SkipReason::TooLarge { bytes, limit } => {
                write!(f, "too large ({bytes} bytes, limit {limit})")
            }
            SkipReason::Binary => write!(f, "binary content"),
            SkipReason::InvalidUtf8 => write!(f, "not valid UTF-8"),
        }
    }
}

/// A candidate path that a build skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    /// Repository-relative path.
    pub path: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of one build pass.
///
/// `updated_paths` lists only the files whose text and embedding were
/// rewritten, so downstream consumers can process just the delta.
///
/// # Examples
///
/// ```
/// use lodestar_core::IndexStats;
///
/// let stats = IndexStats::default();
/// let json = serde_json::to_value(&stats).unwrap();
/// assert!(json.get("updated_paths").is_some());
/// assert_eq!(stats.files_updated, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of candidate paths handed to the build.
    pub files_scanned: usize,
    /// Number of files (re)embedded.
    pub files_updated: usize,
    /// Number of stored files pruned.
    pub files_removed: usize,
    /// Number of candidates skipped as unreadable.
    pub files_skipped: usize,
    /// Paths that were (re)embedded, sorted.
    pub updated_paths: Vec<String>,
    /// Paths that were pruned, sorted.
    pub removed_paths: Vec<String>,
    /// Skipped candidates with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use lodestar_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
