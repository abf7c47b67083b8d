//! Cheap change detection for indexed files.

use std::fmt;
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

/// Opaque proxy for a file's content. Equal fingerprints mean the stored
/// text and embedding can be reused as-is.
///
/// # Examples
///
/// ```
/// use lodestar_index::fingerprint::Fingerprint;
///
/// let a = Fingerprint::of_content(b"fn main() {}");
/// let b = Fingerprint::of_content(b"fn main() {}");
/// assert_eq!(a, b);
/// assert!(a.as_str().starts_with("sha256:"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed fingerprint string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// SHA-256 of the raw bytes.
    pub fn of_content(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("sha256:{:x}", hasher.finalize()))
    }

    /// Size plus modification time (nanoseconds since the epoch).
    ///
    /// A missing or pre-epoch mtime is recorded as 0.
    pub fn of_metadata(metadata: &Metadata) -> Self {
        let mtime_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self(format!("meta:{}:{}", metadata.len(), mtime_ns))
    }

    /// The string form stored in the index.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_fingerprint_changes_with_bytes() {
        let a = Fingerprint::of_content(b"one");
        let b = Fingerprint::of_content(b"two");
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), "sha256:".len() + 64);
    }

    #[test]
    fn metadata_fingerprint_includes_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "12345").unwrap();
        let fp = Fingerprint::of_metadata(&std::fs::metadata(&path).unwrap());
        assert!(fp.as_str().starts_with("meta:5:"));
    }

    #[test]
    fn new_roundtrips_through_display() {
        let fp = Fingerprint::new("meta:1:2");
        assert_eq!(fp.to_string(), "meta:1:2");
    }
}
