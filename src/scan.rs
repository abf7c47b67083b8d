//! Candidate discovery for `lodestar index`.
//!
//! The index itself never walks the filesystem; this walker produces the
//! path list it is handed.

use std::path::{Path, PathBuf};

use lodestar_core::LodestarError;

/// Directory names never descended into.
pub const BUILTIN_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "dist",
    "build",
    "vendor",
    "__pycache__",
    ".venv",
];

/// Walk `root`, respecting `.gitignore`, returning every regular file as a
/// path relative to `root`, sorted.
///
/// Skips [`BUILTIN_EXCLUDES`], the index directory `index_dir` (relative to
/// `root`), and any directory whose name is in `extra_excludes`. Size, binary
/// and encoding checks are left to the index build, which reports them.
///
/// # Errors
///
/// Returns [`LodestarError::Io`] if `root` is not a readable directory.
pub fn scan_repo(
    root: &Path,
    index_dir: &Path,
    extra_excludes: &[String],
) -> Result<Vec<PathBuf>, LodestarError> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(LodestarError::Io(std::io::Error::other(format!(
            "{} is not a directory",
            root.display()
        ))));
    }

    let index_root = root.join(index_dir);
    let extra: Vec<String> = extra_excludes.to_vec();
    let walker = ignore::WalkBuilder::new(root)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            if entry.path() == index_root {
                return false;
            }
            let name = entry.file_name().to_string_lossy();
            !BUILTIN_EXCLUDES.contains(&name.as_ref()) && !extra.iter().any(|e| *e == name)
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        // Make path relative to root
        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => entry.path().to_path_buf(),
        };
        files.push(relative);
    }

    files.sort();
    tracing::debug!(files = files.len(), root = %root.display(), "scan complete");
    Ok(files)
}
