//! SQLite + FTS5 storage for file text, fingerprints, and embeddings.
//!
//! One row per repository-relative path in each of `files`, `documents` and
//! `embeddings`. `documents_fts` is an external-content FTS5 index over
//! `documents`, kept in sync by triggers. Vectors are stored as
//! little-endian `f32` BLOBs of exactly `4 * dimensions` bytes.
//!
//! Reads take `&self` and go through a mutex-guarded connection, so a shared
//! handle can serve queries from several threads. Writes take `&mut self`,
//! which makes one handle the only writer; SQLite's write lock covers other
//! handles. The database runs in WAL mode so readers on other connections
//! proceed while a build is in progress.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use lodestar_core::{IndexConfig, LodestarError};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::embedding::embed_text;
use crate::fingerprint::Fingerprint;

/// Bumped whenever the table layout changes; a mismatch drops and rebuilds.
const SCHEMA_VERSION: &str = "1";

const KEY_SCHEMA_VERSION: &str = "schema_version";
const KEY_DIMENSIONS: &str = "embedding_dimensions";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    body TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    body,
    content='documents', content_rowid='id',
    tokenize="unicode61 tokenchars '_'"
);

-- Triggers to keep FTS in sync
CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
    INSERT INTO documents_fts(rowid, body) VALUES (new.id, new.body);
END;

CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, body) VALUES ('delete', old.id, old.body);
END;

CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, body) VALUES ('delete', old.id, old.body);
    INSERT INTO documents_fts(rowid, body) VALUES (new.id, new.body);
END;

CREATE TABLE IF NOT EXISTS embeddings (
    path TEXT PRIMARY KEY,
    dim INTEGER NOT NULL,
    vector BLOB NOT NULL
);
"#;

const DROP_SCHEMA: &str = "
DROP TRIGGER IF EXISTS documents_ai;
DROP TRIGGER IF EXISTS documents_ad;
DROP TRIGGER IF EXISTS documents_au;
DROP TABLE IF EXISTS documents_fts;
DROP TABLE IF EXISTS documents;
DROP TABLE IF EXISTS files;
DROP TABLE IF EXISTS embeddings;
";

/// Point-in-time counts for an index.
///
/// # Examples
///
/// ```
/// use lodestar_index::store::IndexStore;
///
/// let store = IndexStore::in_memory(64).unwrap();
/// let summary = store.summary().unwrap();
/// assert_eq!(summary.files, 0);
/// assert_eq!(summary.dimensions, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Number of indexed files.
    pub files: usize,
    /// Number of embeddings usable at the configured dimension.
    pub embeddings: usize,
    /// Configured embedding dimension.
    pub dimensions: usize,
    /// Size of the database in bytes.
    pub size_bytes: u64,
}

/// Durable, incrementally-maintained `path -> (fingerprint, text, embedding)`
/// mapping.
///
/// # Examples
///
/// ```
/// use lodestar_index::fingerprint::Fingerprint;
/// use lodestar_index::store::IndexStore;
///
/// let mut store = IndexStore::in_memory(64).unwrap();
/// let fp = Fingerprint::of_content(b"fn main() {}");
/// assert!(store.upsert_file("src/main.rs", "fn main() {}", &fp).unwrap());
/// // Same fingerprint: nothing to do.
/// assert!(!store.upsert_file("src/main.rs", "fn main() {}", &fp).unwrap());
/// ```
pub struct IndexStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl IndexStore {
    /// Open or create an index database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::StoreUnavailable`] if the directory or database
    /// cannot be created, or the schema cannot be initialized.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use lodestar_index::store::IndexStore;
    ///
    /// let store = IndexStore::open(Path::new(".lodestar/index.db"), 256).unwrap();
    /// ```
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, LodestarError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LodestarError::StoreUnavailable(format!(
                    "failed to create index directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            LodestarError::StoreUnavailable(format!(
                "failed to open database {}: {e}",
                path.display()
            ))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| LodestarError::StoreUnavailable(format!("failed to set busy timeout: {e}")))?;
        // Returns the resulting mode ("wal", or "memory" for in-memory databases).
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| LodestarError::StoreUnavailable(format!("failed to enable WAL: {e}")))?;

        Self::with_connection(conn, dimensions)
    }

    /// Open the index for a repository, at `<repo_root>/<config.dir>/index.db`.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::StoreUnavailable`] as [`IndexStore::open`].
    pub fn open_for_repo(repo_root: &Path, config: &IndexConfig) -> Result<Self, LodestarError> {
        Self::open(&config.database_path(repo_root), config.dimensions)
    }

    /// Open an existing index for queries only.
    ///
    /// Never creates files, writes metadata, or drops rows. An index built at
    /// another embedding dimension stays readable for text search; its
    /// vectors are treated as absent until the next build re-embeds them.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::StoreUnavailable`] if the database does not
    /// exist, cannot be opened, or was written by an incompatible release.
    pub fn open_read_only(path: &Path, dimensions: usize) -> Result<Self, LodestarError> {
        if dimensions == 0 {
            return Err(LodestarError::Config(
                "embedding dimensions must be greater than zero".into(),
            ));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            LodestarError::StoreUnavailable(format!(
                "failed to open database {}: {e}",
                path.display()
            ))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| LodestarError::StoreUnavailable(format!("failed to set busy timeout: {e}")))?;

        let unavailable = |e: LodestarError| {
            LodestarError::StoreUnavailable(format!("{}: {e}", path.display()))
        };
        let version = get_metadata(&conn, KEY_SCHEMA_VERSION).map_err(unavailable)?;
        if version.as_deref() != Some(SCHEMA_VERSION) {
            return Err(LodestarError::StoreUnavailable(format!(
                "{} has index format {}, expected {SCHEMA_VERSION}; run `lodestar index` to rebuild",
                path.display(),
                version.as_deref().unwrap_or("unknown"),
            )));
        }
        let stored_dims = get_metadata(&conn, KEY_DIMENSIONS).map_err(unavailable)?;
        if let Some(stored) = stored_dims.filter(|d| *d != dimensions.to_string()) {
            tracing::warn!(
                stored = %stored,
                configured = dimensions,
                "index was embedded at another dimension, vector results need a rebuild"
            );
        }

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    /// Open the index for a repository for queries only.
    ///
    /// Returns `Ok(None)` when no index has been built there yet.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::StoreUnavailable`] as [`IndexStore::open_read_only`].
    pub fn open_read_only_for_repo(
        repo_root: &Path,
        config: &IndexConfig,
    ) -> Result<Option<Self>, LodestarError> {
        let path = config.database_path(repo_root);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no index yet");
            return Ok(None);
        }
        Self::open_read_only(&path, config.dimensions).map(Some)
    }

    /// Create an in-memory index (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::StoreUnavailable`] if schema creation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use lodestar_index::store::IndexStore;
    ///
    /// let store = IndexStore::in_memory(128).unwrap();
    /// assert_eq!(store.dimensions(), 128);
    /// ```
    pub fn in_memory(dimensions: usize) -> Result<Self, LodestarError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            LodestarError::StoreUnavailable(format!("failed to create in-memory database: {e}"))
        })?;
        Self::with_connection(conn, dimensions)
    }

    fn with_connection(conn: Connection, dimensions: usize) -> Result<Self, LodestarError> {
        if dimensions == 0 {
            return Err(LodestarError::Config(
                "embedding dimensions must be greater than zero".into(),
            ));
        }
        let store = Self {
            conn: Mutex::new(conn),
            dimensions,
        };
        store
            .ensure_schema()
            .map_err(|e| LodestarError::StoreUnavailable(e.to_string()))?;
        Ok(store)
    }

    /// Embedding dimension this handle reads and writes.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Create tables if needed; idempotent and safe to call on every open.
    ///
    /// A stored schema version from another release drops every table so the
    /// next build starts from scratch. A stored embedding dimension that
    /// differs from this handle's deletes every embedding, so the next build
    /// re-embeds all files.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] if any statement fails.
    pub fn ensure_schema(&self) -> Result<(), LodestarError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| db("failed to begin schema transaction", e))?;

        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| db("failed to create metadata table", e))?;

        let version = get_metadata(&tx, KEY_SCHEMA_VERSION)?;
        if let Some(v) = version.as_deref().filter(|v| *v != SCHEMA_VERSION) {
            tracing::warn!(
                stored = v,
                current = SCHEMA_VERSION,
                "index format changed, discarding existing index"
            );
            tx.execute_batch(DROP_SCHEMA)
                .map_err(|e| db("failed to drop old schema", e))?;
            tx.execute("DELETE FROM metadata", [])
                .map_err(|e| db("failed to reset metadata", e))?;
        }

        tx.execute_batch(SCHEMA)
            .map_err(|e| db("failed to create schema", e))?;
        set_metadata(&tx, KEY_SCHEMA_VERSION, SCHEMA_VERSION)?;

        let stored_dims = get_metadata(&tx, KEY_DIMENSIONS)?;
        let configured = self.dimensions.to_string();
        if stored_dims.as_deref() != Some(configured.as_str()) {
            if let Some(stored) = stored_dims {
                let dropped = tx
                    .execute("DELETE FROM embeddings", [])
                    .map_err(|e| db("failed to invalidate embeddings", e))?;
                tracing::warn!(
                    stored = %stored,
                    configured = self.dimensions,
                    dropped,
                    "embedding dimension changed, all files will be re-embedded"
                );
            }
            set_metadata(&tx, KEY_DIMENSIONS, &configured)?;
        }

        tx.commit()
            .map_err(|e| db("failed to commit schema", e))?;
        Ok(())
    }

    /// Whether `path` is stored with this exact fingerprint and a usable
    /// embedding. Compares metadata only; never touches the text.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn is_fresh(&self, path: &str, fingerprint: &Fingerprint) -> Result<bool, LodestarError> {
        let conn = self.conn()?;
        let row: Option<(String, Option<i64>, Option<i64>)> = conn
            .query_row(
                "SELECT f.fingerprint, e.dim, length(e.vector)
                 FROM files f LEFT JOIN embeddings e ON e.path = f.path
                 WHERE f.path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| db("failed to read fingerprint", e))?;

        let Some((stored, dim, blob_len)) = row else {
            return Ok(false);
        };
        let dims = self.dimensions as i64;
        Ok(stored == fingerprint.as_str() && dim == Some(dims) && blob_len == Some(dims * 4))
    }

    /// Get the stored fingerprint for a path, if it has been indexed.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn fingerprint(&self, path: &str) -> Result<Option<Fingerprint>, LodestarError> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT fingerprint FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| db("failed to get fingerprint", e))?;
        Ok(value.map(Fingerprint::new))
    }

    /// Store `content` for `path`, re-embedding it, unless the stored
    /// fingerprint already matches.
    ///
    /// Returns `true` when the file was (re)written. File row, text and
    /// embedding are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on write failure.
    pub fn upsert_file(
        &mut self,
        path: &str,
        content: &str,
        fingerprint: &Fingerprint,
    ) -> Result<bool, LodestarError> {
        if self.is_fresh(path, fingerprint)? {
            return Ok(false);
        }

        let embedding = embed_text(content, self.dimensions);
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn_mut()?;
        let tx = conn
            .transaction()
            .map_err(|e| db("failed to begin upsert", e))?;

        tx.execute(
            "INSERT INTO files (path, fingerprint, size_bytes, indexed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                size_bytes = excluded.size_bytes,
                indexed_at = excluded.indexed_at",
            params![path, fingerprint.as_str(), content.len() as i64, now],
        )
        .map_err(|e| db("failed to record file", e))?;

        tx.execute(
            "INSERT INTO documents (path, body) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET body = excluded.body",
            params![path, content],
        )
        .map_err(|e| db("failed to store text", e))?;

        write_embedding(&tx, path, &embedding)?;

        tx.commit().map_err(|e| db("failed to commit upsert", e))?;
        tracing::debug!(path, "indexed file");
        Ok(true)
    }

    /// Delete every stored path that is not in `current_paths`.
    ///
    /// Returns the removed paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on delete failure.
    pub fn prune_missing<I, S>(&mut self, current_paths: I) -> Result<Vec<String>, LodestarError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keep: HashSet<String> = current_paths
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        let stale: Vec<String> = self
            .iterate_paths()?
            .into_iter()
            .filter(|p| !keep.contains(p))
            .collect();
        if stale.is_empty() {
            return Ok(stale);
        }

        let conn = self.conn_mut()?;
        let tx = conn.transaction().map_err(|e| db("failed to begin prune", e))?;
        for path in &stale {
            delete_path(&tx, path)?;
        }
        tx.commit().map_err(|e| db("failed to commit prune", e))?;

        tracing::debug!(removed = stale.len(), "pruned missing files");
        Ok(stale)
    }

    /// Remove all rows for a single path.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on delete failure.
    pub fn remove_file(&mut self, path: &str) -> Result<(), LodestarError> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction().map_err(|e| db("failed to begin delete", e))?;
        delete_path(&tx, path)?;
        tx.commit().map_err(|e| db("failed to commit delete", e))?;
        Ok(())
    }

    /// Stored text for `path`, verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn get_text(&self, path: &str) -> Result<Option<String>, LodestarError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT body FROM documents WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| db("failed to get text", e))
    }

    /// All indexed paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn iterate_paths(&self) -> Result<Vec<String>, LodestarError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT path FROM files ORDER BY path")
            .map_err(|e| db("failed to prepare query", e))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| db("failed to query files", e))?;

        let mut paths = Vec::new();
        for row in rows {
            let path: String = row.map_err(|e| db("failed to read row", e))?;
            paths.push(path);
        }
        Ok(paths)
    }

    /// Stored embedding for `path`.
    ///
    /// A row that cannot be decoded, or whose dimension differs from this
    /// index, is reported as absent.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn get_embedding(&self, path: &str) -> Result<Option<Vec<f32>>, LodestarError> {
        let conn = self.conn()?;
        let row: Option<(i64, Vec<u8>)> = conn
            .query_row(
                "SELECT dim, vector FROM embeddings WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| db("failed to get embedding", e))?;

        let Some((dim, bytes)) = row else {
            return Ok(None);
        };
        match decode_embedding(path, dim, &bytes, self.dimensions) {
            Ok(vector) => Ok(Some(vector)),
            Err(e) => {
                tracing::debug!(error = %e, "treating unusable embedding as absent");
                Ok(None)
            }
        }
    }

    /// Overwrite the embedding for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::DimensionMismatch`] if `vector` does not have
    /// this index's dimension, or [`LodestarError::Database`] on write failure.
    pub fn put_embedding(&mut self, path: &str, vector: &[f32]) -> Result<(), LodestarError> {
        if vector.len() != self.dimensions {
            return Err(LodestarError::DimensionMismatch {
                path: path.to_string(),
                expected: self.dimensions,
                found: vector.len(),
            });
        }
        let conn = self.conn_mut()?;
        write_embedding(conn, path, vector)
    }

    /// Call `f` with every usable embedding, in path order.
    ///
    /// Corrupt and mismatched rows are skipped. Rows are streamed from the
    /// database; nothing is cached between calls.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn for_each_embedding<F>(&self, mut f: F) -> Result<(), LodestarError>
    where
        F: FnMut(&str, &[f32]),
    {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT path, dim, vector FROM embeddings ORDER BY path")
            .map_err(|e| db("failed to prepare query", e))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| db("failed to query embeddings", e))?;

        while let Some(row) = rows.next().map_err(|e| db("failed to read row", e))? {
            let path: String = row.get(0).map_err(|e| db("failed to read path", e))?;
            let dim: i64 = row.get(1).map_err(|e| db("failed to read dim", e))?;
            let bytes: Vec<u8> = row.get(2).map_err(|e| db("failed to read vector", e))?;
            match decode_embedding(&path, dim, &bytes, self.dimensions) {
                Ok(vector) => f(&path, &vector),
                Err(e) => tracing::debug!(error = %e, "skipping unusable embedding"),
            }
        }
        Ok(())
    }

    /// Get index counts and size.
    ///
    /// # Errors
    ///
    /// Returns [`LodestarError::Database`] on query failure.
    pub fn summary(&self) -> Result<IndexSummary, LodestarError> {
        let conn = self.conn()?;
        let files: i64 = conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .map_err(|e| db("failed to count files", e))?;
        let dims = self.dimensions as i64;
        let embeddings: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM embeddings WHERE dim = ?1 AND length(vector) = ?2",
                params![dims, dims * 4],
                |row| row.get(0),
            )
            .map_err(|e| db("failed to count embeddings", e))?;

        // For in-memory databases, page_count returns a small number
        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(IndexSummary {
            files: files as usize,
            embeddings: embeddings as usize,
            dimensions: self.dimensions,
            size_bytes: (page_count * page_size) as u64,
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, LodestarError> {
        self.conn
            .lock()
            .map_err(|_| LodestarError::Database("index connection lock poisoned".into()))
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, LodestarError> {
        self.conn
            .get_mut()
            .map_err(|_| LodestarError::Database("index connection lock poisoned".into()))
    }
}

pub(crate) fn db(context: &str, e: rusqlite::Error) -> LodestarError {
    LodestarError::Database(format!("{context}: {e}"))
}

fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, LodestarError> {
    conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| db(&format!("failed to get metadata '{key}'"), e))
}

fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<(), LodestarError> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(|e| db(&format!("failed to set metadata '{key}'"), e))?;
    Ok(())
}

fn write_embedding(conn: &Connection, path: &str, vector: &[f32]) -> Result<(), LodestarError> {
    conn.execute(
        "INSERT OR REPLACE INTO embeddings (path, dim, vector) VALUES (?1, ?2, ?3)",
        params![path, vector.len() as i64, floats_to_bytes(vector)],
    )
    .map_err(|e| db("failed to store embedding", e))?;
    Ok(())
}

fn delete_path(conn: &Connection, path: &str) -> Result<(), LodestarError> {
    conn.execute("DELETE FROM documents WHERE path = ?1", params![path])
        .map_err(|e| db("failed to delete text", e))?;
    conn.execute("DELETE FROM embeddings WHERE path = ?1", params![path])
        .map_err(|e| db("failed to delete embedding", e))?;
    conn.execute("DELETE FROM files WHERE path = ?1", params![path])
        .map_err(|e| db("failed to delete file record", e))?;
    Ok(())
}

fn decode_embedding(
    path: &str,
    stored_dim: i64,
    bytes: &[u8],
    expected: usize,
) -> Result<Vec<f32>, LodestarError> {
    let found = usize::try_from(stored_dim).map_err(|_| LodestarError::CorruptRow {
        path: path.to_string(),
        reason: format!("negative dimension {stored_dim}"),
    })?;
    if found != expected {
        return Err(LodestarError::DimensionMismatch {
            path: path.to_string(),
            expected,
            found,
        });
    }
    if bytes.len() != expected * 4 {
        return Err(LodestarError::CorruptRow {
            path: path.to_string(),
            reason: format!("vector is {} bytes, expected {}", bytes.len(), expected * 4),
        });
    }
    let vector = bytes_to_floats(bytes);
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(LodestarError::CorruptRow {
            path: path.to_string(),
            reason: "vector contains non-finite values".into(),
        });
    }
    Ok(vector)
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
