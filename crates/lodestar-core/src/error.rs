use std::path::PathBuf;

use crate::types::SkipReason;

/// Errors that can occur across the Lodestar workspace.
///
/// Store-level variants ([`StoreUnavailable`](LodestarError::StoreUnavailable),
/// [`Database`](LodestarError::Database)) abort the current operation. The
/// per-record variants are absorbed by the index builder and by readers, so a
/// build completes with partial coverage instead of failing.
///
/// # Examples
///
/// ```
/// use lodestar_core::LodestarError;
///
/// let err = LodestarError::Config("dimensions must be positive".into());
/// assert!(err.to_string().contains("dimensions must be positive"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LodestarError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(lodestar::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(lodestar::config), help("check your .lodestar.toml"))]
    Config(String),

    /// The index database could not be opened or initialized.
    #[error("index store unavailable: {0}")]
    #[diagnostic(
        code(lodestar::store_unavailable),
        help("delete the index directory and run `lodestar index` to rebuild it")
    )]
    StoreUnavailable(String),

    /// A query or write against an open index failed.
    #[error("database error: {0}")]
    #[diagnostic(code(lodestar::database))]
    Database(String),

    /// A candidate file could not be read as text.
    #[error("cannot read {}: {reason}", .path.display())]
    #[diagnostic(code(lodestar::file_unreadable))]
    FileUnreadable {
        /// Path of the skipped file.
        path: PathBuf,
        /// Why it was skipped.
        reason: SkipReason,
    },

    /// A stored row could not be decoded.
    #[error("corrupt index row for {path}: {reason}")]
    #[diagnostic(code(lodestar::corrupt_row))]
    CorruptRow {
        /// Index key of the row.
        path: String,
        /// Decoding failure.
        reason: String,
    },

    /// A stored embedding has a different dimension than the index.
    #[error("embedding for {path} has {found} dimensions, index uses {expected}")]
    #[diagnostic(code(lodestar::dimension_mismatch))]
    DimensionMismatch {
        /// Index key of the row.
        path: String,
        /// Configured dimension.
        expected: usize,
        /// Stored dimension.
        found: usize,
    },

    /// The grounded-retrieval collaborator failed.
    #[error("grounded retrieval failed: {0}")]
    #[diagnostic(code(lodestar::collaborator))]
    Collaborator(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(lodestar::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(lodestar::toml))]
    Toml(#[from] toml::de::Error),
}

impl LodestarError {
    /// Whether this error only affects a single record and should be
    /// absorbed rather than aborting the surrounding operation.
    ///
    /// # Examples
    ///
    /// ```
    /// use lodestar_core::LodestarError;
    ///
    /// let err = LodestarError::CorruptRow { path: "a.rs".into(), reason: "short blob".into() };
    /// assert!(err.is_local());
    /// assert!(!LodestarError::StoreUnavailable("locked".into()).is_local());
    /// ```
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            LodestarError::FileUnreadable { .. }
                | LodestarError::CorruptRow { .. }
                | LodestarError::DimensionMismatch { .. }
                | LodestarError::Collaborator(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LodestarError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = LodestarError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_unreadable_shows_path_and_reason() {
        let err = LodestarError::FileUnreadable {
            path: PathBuf::from("/tmp/blob.bin"),
            reason: SkipReason::Binary,
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/blob.bin"));
        assert!(msg.contains("binary"));
    }

    #[test]
    fn dimension_mismatch_names_both_sizes() {
        let err = LodestarError::DimensionMismatch {
            path: "src/lib.rs".into(),
            expected: 256,
            found: 128,
        };
        let msg = err.to_string();
        assert!(msg.contains("256"));
        assert!(msg.contains("128"));
    }

    #[test]
    fn store_errors_are_not_local() {
        assert!(!LodestarError::Database("disk I/O".into()).is_local());
        assert!(LodestarError::Collaborator("offline".into()).is_local());
    }
}
