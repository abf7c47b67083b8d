use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LodestarError;
use crate::types::{MergeStrategy, SearchMode};

/// Default embedding dimension for new indexes.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Standard RRF smoothing constant (Cormack, Clarke and Buettcher, SIGIR 2009).
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Top-level configuration loaded from `.lodestar.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use lodestar_core::LodestarConfig;
///
/// let config = LodestarConfig::default();
/// assert_eq!(config.index.dimensions, 256);
/// assert_eq!(config.search.limit, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LodestarConfig {
    /// Index location and embedding settings.
    #[serde(default)]
    pub index: IndexConfig,
    /// Query defaults and fusion tuning.
    #[serde(default)]
    pub search: SearchConfig,
    /// Repository scanning rules.
    #[serde(default)]
    pub scan: ScanConfig,
}

impl LodestarConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Io`] if the file cannot be read,
    /// [`LodestarError::Toml`] if the content is not valid TOML, or
    /// [`LodestarError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lodestar_core::LodestarConfig;
    /// use std::path::Path;
    ///
    /// let config = LodestarConfig::from_file(Path::new(".lodestar.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LodestarError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Toml`] if parsing fails, or
    /// [`LodestarError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use lodestar_core::{LodestarConfig, MergeStrategy};
    ///
    /// let toml = r#"
    /// [search]
    /// merge = "max"
    /// limit = 5
    /// "#;
    /// let config = LodestarConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.search.merge, MergeStrategy::Max);
    /// assert_eq!(config.search.limit, 5);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LodestarError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the index and fusion code cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<(), LodestarError> {
        if self.index.dimensions == 0 {
            return Err(LodestarError::Config(
                "index.dimensions must be greater than zero".into(),
            ));
        }
        if self.index.dir.as_os_str().is_empty() {
            return Err(LodestarError::Config("index.dir must not be empty".into()));
        }
        if !self.search.rrf_k.is_finite() || self.search.rrf_k < 0.0 {
            return Err(LodestarError::Config(format!(
                "search.rrf_k must be a non-negative number, got {}",
                self.search.rrf_k
            )));
        }
        if !self.search.bm25_weight.is_finite() || !self.search.dense_weight.is_finite() {
            return Err(LodestarError::Config(
                "search.bm25_weight and search.dense_weight must be finite".into(),
            ));
        }
        if self.search.candidate_multiplier == 0 {
            return Err(LodestarError::Config(
                "search.candidate_multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// How a file's fingerprint is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintStrategy {
    /// SHA-256 of the file bytes.
    #[default]
    Content,
    /// File size plus modification time; unchanged files are never read.
    Metadata,
}

/// Index configuration.
///
/// # Examples
///
/// ```
/// use lodestar_core::{FingerprintStrategy, IndexConfig};
///
/// let config = IndexConfig::default();
/// assert_eq!(config.fingerprint, FingerprintStrategy::Content);
/// assert_eq!(config.max_file_bytes, 1_048_576);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index directory, relative to the repository root (default: `.lodestar`).
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    /// Embedding dimension (default: 256). Changing it forces a full re-embed.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Fingerprint strategy for change detection (default: `content`).
    #[serde(default)]
    pub fingerprint: FingerprintStrategy,
    /// Files larger than this are skipped (default: 1 MiB).
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from(".lodestar")
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_max_file_bytes() -> u64 {
    1_048_576
}

impl IndexConfig {
    /// Path of the index database for a repository.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use lodestar_core::IndexConfig;
    ///
    /// let db = IndexConfig::default().database_path(Path::new("/repo"));
    /// assert_eq!(db, Path::new("/repo/.lodestar/index.db"));
    /// ```
    pub fn database_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.dir).join("index.db")
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            dimensions: default_dimensions(),
            fingerprint: FingerprintStrategy::default(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Query configuration.
///
/// # Examples
///
/// ```
/// use lodestar_core::{MergeStrategy, SearchConfig, SearchMode};
///
/// let config = SearchConfig::default();
/// assert_eq!(config.mode, SearchMode::Hybrid);
/// assert_eq!(config.merge, MergeStrategy::Rrf);
/// assert_eq!(config.rrf_k, 60.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default search mode (default: `hybrid`).
    #[serde(default)]
    pub mode: SearchMode,
    /// Default number of results (default: 10).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// How hybrid mode merges its two result lists (default: `rrf`).
    #[serde(default)]
    pub merge: MergeStrategy,
    /// RRF smoothing constant (default: 60).
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    /// Weight of lexical scores in weighted merging (default: 1.0).
    #[serde(default = "default_weight")]
    pub bm25_weight: f64,
    /// Weight of vector scores in weighted merging (default: 1.0).
    #[serde(default = "default_weight")]
    pub dense_weight: f64,
    /// Each strategy fetches `limit * candidate_multiplier` candidates
    /// before merging (default: 2).
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

fn default_limit() -> usize {
    10
}

fn default_rrf_k() -> f64 {
    DEFAULT_RRF_K
}

fn default_weight() -> f64 {
    1.0
}

fn default_candidate_multiplier() -> usize {
    2
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            limit: default_limit(),
            merge: MergeStrategy::default(),
            rrf_k: default_rrf_k(),
            bm25_weight: default_weight(),
            dense_weight: default_weight(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

/// Repository scanning configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extra directory names to exclude, on top of the built-in list.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = LodestarConfig::default();
        assert_eq!(config.index.dir, PathBuf::from(".lodestar"));
        assert_eq!(config.index.dimensions, DEFAULT_DIMENSIONS);
        assert_eq!(config.index.fingerprint, FingerprintStrategy::Content);
        assert_eq!(config.search.mode, SearchMode::Hybrid);
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.search.bm25_weight, 1.0);
        assert_eq!(config.search.dense_weight, 1.0);
        assert_eq!(config.search.candidate_multiplier, 2);
        assert_eq!(config.search.rrf_k, DEFAULT_RRF_K);
        assert!(config.scan.exclude.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[index]
dir = ".cache/lodestar"
dimensions = 512
fingerprint = "metadata"
max_file_bytes = 2048

[search]
mode = "lexical"
limit = 25
merge = "weighted"
rrf_k = 10.0
bm25_weight = 0.5
dense_weight = 2.0
candidate_multiplier = 4

[scan]
exclude = ["fixtures", "third_party"]
"#;
        let config = LodestarConfig::from_toml(toml).unwrap();
        assert_eq!(config.index.dir, PathBuf::from(".cache/lodestar"));
        assert_eq!(config.index.dimensions, 512);
        assert_eq!(config.index.fingerprint, FingerprintStrategy::Metadata);
        assert_eq!(config.index.max_file_bytes, 2048);
        assert_eq!(config.search.mode, SearchMode::Lexical);
        assert_eq!(config.search.merge, MergeStrategy::Weighted);
        assert_eq!(config.search.rrf_k, 10.0);
        assert_eq!(config.search.candidate_multiplier, 4);
        assert_eq!(config.scan.exclude, vec!["fixtures", "third_party"]);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = LodestarConfig::from_toml("").unwrap();
        assert_eq!(config.index.dimensions, DEFAULT_DIMENSIONS);
        assert_eq!(config.search.limit, 10);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(LodestarConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn zero_dimensions_rejected() {
        let err = LodestarConfig::from_toml("[index]\ndimensions = 0\n").unwrap_err();
        assert!(err.to_string().contains("index.dimensions"));
    }

    #[test]
    fn negative_rrf_k_rejected() {
        let err = LodestarConfig::from_toml("[search]\nrrf_k = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("rrf_k"));
    }

    #[test]
    fn unknown_mode_rejected() {
        assert!(LodestarConfig::from_toml("[search]\nmode = \"fuzzy\"\n").is_err());
    }

    #[test]
    fn database_path_joins_dir() {
        let config = IndexConfig {
            dir: PathBuf::from("idx"),
            ..IndexConfig::default()
        };
        assert_eq!(
            config.database_path(Path::new("/r")),
            PathBuf::from("/r/idx/index.db")
        );
    }
}
