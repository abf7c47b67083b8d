//! Incremental build pass over a caller-supplied path list.
//!
//! The builder never walks the filesystem: it reads exactly the paths it is
//! given. Each file is upserted in its own transaction, so an interrupted
//! build leaves a consistent, partially advanced index that the next run
//! finishes (unchanged files short-circuit on their fingerprint).

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use lodestar_core::{
    FingerprintStrategy, IndexConfig, IndexStats, LodestarError, SkipReason, SkippedFile,
};

use crate::fingerprint::Fingerprint;
use crate::store::IndexStore;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Knobs for a build pass.
///
/// # Examples
///
/// ```
/// use lodestar_core::IndexConfig;
/// use lodestar_index::build::BuildOptions;
///
/// let options = BuildOptions::from(&IndexConfig::default());
/// assert_eq!(options.max_file_bytes, 1_048_576);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// How change detection fingerprints are computed.
    pub fingerprint: FingerprintStrategy,
    /// Larger files are skipped.
    pub max_file_bytes: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for BuildOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            fingerprint: config.fingerprint,
            max_file_bytes: config.max_file_bytes,
        }
    }
}

impl IndexStore {
    /// Bring the index in line with `paths`: upsert each one, then prune
    /// every stored path not among them.
    ///
    /// Relative paths are resolved against `repo_root`; stored keys are
    /// repository-relative with `/` separators. Unreadable files are skipped,
    /// recorded in [`IndexStats::skipped`], and treated as absent (so a
    /// previously indexed copy is pruned).
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] if the store itself fails; the
    /// build stops at that point with every earlier file committed.
    ///
    /// # Examples
    ///
    /// ```
    /// use lodestar_index::build::BuildOptions;
    /// use lodestar_index::store::IndexStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// std::fs::write(dir.path().join("lib.rs"), "pub fn answer() -> u8 { 42 }").unwrap();
    ///
    /// let mut store = IndexStore::in_memory(64).unwrap();
    /// let stats = store.build(dir.path(), &["lib.rs"], &BuildOptions::default()).unwrap();
    /// assert_eq!(stats.updated_paths, vec!["lib.rs"]);
    /// ```
    pub fn build<P: AsRef<Path>>(
        &mut self,
        repo_root: &Path,
        paths: &[P],
        options: &BuildOptions,
    ) -> Result<IndexStats, LodestarError> {
        let mut stats = IndexStats {
            files_scanned: paths.len(),
            ..IndexStats::default()
        };
        let mut present: HashSet<String> = HashSet::new();

        for candidate in paths {
            let (absolute, key) = resolve(repo_root, candidate.as_ref());
            if !present.insert(key.clone()) {
                continue;
            }

            match self.index_one(&absolute, &key, options) {
                Ok(true) => stats.updated_paths.push(key),
                Ok(false) => tracing::trace!(path = %key, "unchanged"),
                Err(e) if e.is_local() => {
                    let reason = match e {
                        LodestarError::FileUnreadable { reason, .. } => reason,
                        other => SkipReason::Io {
                            message: other.to_string(),
                        },
                    };
                    tracing::warn!(path = %key, %reason, "skipping unreadable file");
                    present.remove(&key);
                    stats.skipped.push(SkippedFile { path: key, reason });
                }
                Err(e) => return Err(e),
            }
        }

        stats.removed_paths = self.prune_missing(&present)?;
        stats.updated_paths.sort();
        stats.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        stats.files_updated = stats.updated_paths.len();
        stats.files_removed = stats.removed_paths.len();
        stats.files_skipped = stats.skipped.len();

        tracing::info!(
            scanned = stats.files_scanned,
            updated = stats.files_updated,
            removed = stats.files_removed,
            skipped = stats.files_skipped,
            "index build complete"
        );
        Ok(stats)
    }

    fn index_one(
        &mut self,
        absolute: &Path,
        key: &str,
        options: &BuildOptions,
    ) -> Result<bool, LodestarError> {
        match options.fingerprint {
            FingerprintStrategy::Metadata => {
                let metadata = file_metadata(absolute, options.max_file_bytes)?;
                let fingerprint = Fingerprint::of_metadata(&metadata);
                if self.is_fresh(key, &fingerprint)? {
                    return Ok(false);
                }
                let bytes = read_bytes(absolute)?;
                let text = decode_text(absolute, bytes)?;
                self.upsert_file(key, &text, &fingerprint)
            }
            FingerprintStrategy::Content => {
                file_metadata(absolute, options.max_file_bytes)?;
                let bytes = read_bytes(absolute)?;
                let fingerprint = Fingerprint::of_content(&bytes);
                if self.is_fresh(key, &fingerprint)? {
                    return Ok(false);
                }
                let text = decode_text(absolute, bytes)?;
                self.upsert_file(key, &text, &fingerprint)
            }
        }
    }
}

/// Resolve a candidate against the repository root and derive its index key.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use lodestar_index::build::resolve;
///
/// let (abs, key) = resolve(Path::new("/repo"), Path::new("./src/lib.rs"));
/// assert_eq!(abs, Path::new("/repo/./src/lib.rs"));
/// assert_eq!(key, "src/lib.rs");
/// ```
pub fn resolve(repo_root: &Path, candidate: &Path) -> (PathBuf, String) {
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        repo_root.join(candidate)
    };
    let relative = absolute.strip_prefix(repo_root).unwrap_or(candidate);
    let key = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    (absolute, key)
}

fn unreadable(path: &Path, reason: SkipReason) -> LodestarError {
    LodestarError::FileUnreadable {
        path: path.to_path_buf(),
        reason,
    }
}

fn file_metadata(path: &Path, max_bytes: u64) -> Result<std::fs::Metadata, LodestarError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        unreadable(
            path,
            SkipReason::Io {
                message: e.to_string(),
            },
        )
    })?;
    if !metadata.is_file() {
        return Err(unreadable(
            path,
            SkipReason::Io {
                message: "not a regular file".into(),
            },
        ));
    }
    if metadata.len() > max_bytes {
        return Err(unreadable(
            path,
            SkipReason::TooLarge {
                bytes: metadata.len(),
                limit: max_bytes,
            },
        ));
    }
    Ok(metadata)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LodestarError> {
    std::fs::read(path).map_err(|e| {
        unreadable(
            path,
            SkipReason::Io {
                message: e.to_string(),
            },
        )
    })
}

fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String, LodestarError> {
    // Check for binary content (null bytes in first 8KB)
    let check_len = bytes.len().min(BINARY_CHECK_SIZE);
    if bytes[..check_len].contains(&0) {
        return Err(unreadable(path, SkipReason::Binary));
    }
    String::from_utf8(bytes).map_err(|_| unreadable(path, SkipReason::InvalidUtf8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_repo(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
        dir
    }

    #[test]
    fn resolve_normalizes_relative_and_absolute() {
        let root = Path::new("/repo");
        assert_eq!(resolve(root, Path::new("src/a.rs")).1, "src/a.rs");
        assert_eq!(resolve(root, Path::new("/repo/src/b.rs")).1, "src/b.rs");
    }

    #[test]
    fn build_indexes_every_readable_file() {
        let repo = make_repo(&[
            ("src/a.rs", b"fn alpha() {}"),
            ("src/b.rs", b"fn beta() {}"),
        ]);
        let mut store = IndexStore::in_memory(32).unwrap();
        let stats = store
            .build(repo.path(), &["src/b.rs", "src/a.rs"], &BuildOptions::default())
            .unwrap();

        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.files_updated, 2);
        assert_eq!(stats.updated_paths, vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(stats.files_removed, 0);
        assert_eq!(stats.files_skipped, 0);
    }

    #[test]
    fn second_build_without_changes_updates_nothing() {
        let repo = make_repo(&[("a.rs", b"fn a() {}"), ("b.rs", b"fn b() {}")]);
        let mut store = IndexStore::in_memory(32).unwrap();
        let paths = ["a.rs", "b.rs"];
        store
            .build(repo.path(), &paths, &BuildOptions::default())
            .unwrap();
        let embeddings_before: Vec<_> = paths
            .iter()
            .map(|p| store.get_embedding(p).unwrap())
            .collect();
        let text_before: Vec<_> = paths.iter().map(|p| store.get_text(p).unwrap()).collect();

        let stats = store
            .build(repo.path(), &paths, &BuildOptions::default())
            .unwrap();
        assert_eq!(stats.files_updated, 0);
        assert!(stats.updated_paths.is_empty());
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(store.get_embedding(path).unwrap(), embeddings_before[i]);
            assert_eq!(store.get_text(path).unwrap(), text_before[i]);
        }
        assert_eq!(store.get_text("a.rs").unwrap().as_deref(), Some("fn a() {}"));
    }

    #[test]
    fn changed_file_is_the_only_update() {
        let repo = make_repo(&[("a.rs", b"fn a() {}"), ("b.rs", b"fn b() {}")]);
        let mut store = IndexStore::in_memory(32).unwrap();
        let paths = ["a.rs", "b.rs"];
        store
            .build(repo.path(), &paths, &BuildOptions::default())
            .unwrap();

        fs::write(repo.path().join("b.rs"), "fn b_changed() { 1 + 1 }").unwrap();
        let stats = store
            .build(repo.path(), &paths, &BuildOptions::default())
            .unwrap();
        assert_eq!(stats.updated_paths, vec!["b.rs"]);
        assert!(store
            .get_text("b.rs")
            .unwrap()
            .unwrap()
            .contains("b_changed"));
    }

    #[test]
    fn paths_missing_from_scan_are_pruned() {
        let repo = make_repo(&[("a.rs", b"fn a() {}"), ("b.rs", b"fn b() {}")]);
        let mut store = IndexStore::in_memory(32).unwrap();
        store
            .build(repo.path(), &["a.rs", "b.rs"], &BuildOptions::default())
            .unwrap();

        let stats = store
            .build(repo.path(), &["a.rs"], &BuildOptions::default())
            .unwrap();
        assert_eq!(stats.files_removed, 1);
        assert_eq!(stats.removed_paths, vec!["b.rs"]);
        assert_eq!(store.iterate_paths().unwrap(), vec!["a.rs"]);
    }

    #[test]
    fn unreadable_files_are_skipped_not_fatal() {
        let mut binary = b"fn main() { ".to_vec();
        binary.push(0);
        let repo = make_repo(&[
            ("ok.rs", b"fn ok() {}"),
            ("blob.rs", &binary),
            ("latin1.txt", &[0x66, 0x6f, 0xe9, 0x0a]),
        ]);
        let mut store = IndexStore::in_memory(32).unwrap();
        let stats = store
            .build(
                repo.path(),
                &["ok.rs", "blob.rs", "latin1.txt", "missing.rs"],
                &BuildOptions::default(),
            )
            .unwrap();

        assert_eq!(stats.files_updated, 1);
        assert_eq!(stats.files_skipped, 3);
        let reasons: Vec<(&str, &SkipReason)> = stats
            .skipped
            .iter()
            .map(|s| (s.path.as_str(), &s.reason))
            .collect();
        assert_eq!(reasons[0], ("blob.rs", &SkipReason::Binary));
        assert_eq!(reasons[1], ("latin1.txt", &SkipReason::InvalidUtf8));
        assert_eq!(reasons[2].0, "missing.rs");
        assert!(matches!(reasons[2].1, SkipReason::Io { .. }));
    }

    #[test]
    fn oversized_file_is_skipped() {
        let repo = make_repo(&[("big.rs", &[b'x'; 64])]);
        let mut store = IndexStore::in_memory(8).unwrap();
        let options = BuildOptions {
            max_file_bytes: 10,
            ..BuildOptions::default()
        };
        let stats = store.build(repo.path(), &["big.rs"], &options).unwrap();
        assert_eq!(
            stats.skipped[0].reason,
            SkipReason::TooLarge {
                bytes: 64,
                limit: 10
            }
        );
    }

    #[test]
    fn file_turning_unreadable_drops_old_row() {
        let repo = make_repo(&[("a.rs", b"fn a() {}")]);
        let mut store = IndexStore::in_memory(8).unwrap();
        store
            .build(repo.path(), &["a.rs"], &BuildOptions::default())
            .unwrap();

        fs::write(repo.path().join("a.rs"), [0u8, 1, 2]).unwrap();
        let stats = store
            .build(repo.path(), &["a.rs"], &BuildOptions::default())
            .unwrap();
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.removed_paths, vec!["a.rs"]);
        assert_eq!(store.get_text("a.rs").unwrap(), None);
    }

    #[test]
    fn metadata_strategy_skips_unchanged_files() {
        let repo = make_repo(&[("a.rs", b"fn a() {}")]);
        let mut store = IndexStore::in_memory(8).unwrap();
        let options = BuildOptions {
            fingerprint: FingerprintStrategy::Metadata,
            ..BuildOptions::default()
        };
        let first = store.build(repo.path(), &["a.rs"], &options).unwrap();
        assert_eq!(first.files_updated, 1);
        let fp = store.fingerprint("a.rs").unwrap().unwrap();
        assert!(fp.as_str().starts_with("meta:9:"));

        let second = store.build(repo.path(), &["a.rs"], &options).unwrap();
        assert_eq!(second.files_updated, 0);
    }

    #[test]
    fn duplicate_candidates_are_indexed_once() {
        let repo = make_repo(&[("a.rs", b"fn a() {}")]);
        let mut store = IndexStore::in_memory(8).unwrap();
        let stats = store
            .build(repo.path(), &["a.rs", "./a.rs"], &BuildOptions::default())
            .unwrap();
        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.updated_paths, vec!["a.rs"]);
    }
}
