//! Embedded `SQLite` + FTS5 store.
//!
//! One store file holds four record families, each behind typed
//! encode/decode at this boundary:
//!
//! - `chunks` + `chunks_fts`: line-range slices of source files
//! - `indexed_files`: the per-file content-hash registry
//! - `tools` + `tools_fts`: normalized capability descriptors
//! - `docs` + `docs_fts`: curated long-form documentation
//!
//! The store serializes access within a process through a
//! [`Mutex<Connection>`](rusqlite::Connection). Per-file chunk replacement
//! runs inside a single `BEGIN IMMEDIATE` transaction so a reader never
//! observes a half-replaced chunk set. There is no cross-invocation lock;
//! concurrent external invocations are last-writer-wins.

mod chunks;
mod docs;
mod tools;

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Helper to acquire the connection lock with poison recovery.
///
/// If the mutex is poisoned by a panic in a previous critical section, the
/// inner connection is still structurally valid; recover it and warn.
pub(crate) fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("store mutex was poisoned, recovering");
            metrics::counter!("store_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Escapes SQL LIKE wildcards so user input matches literally.
///
/// Uses `\` as the escape character (requires `ESCAPE '\'` in the LIKE
/// clause).
pub(crate) fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// The embedded store.
pub struct Store {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the store file (None for in-memory).
    db_path: Option<PathBuf>,
}

/// Aggregate record counts, used by command summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of chunks.
    pub chunks: usize,
    /// Number of indexed-file registry records.
    pub files: usize,
    /// Number of tool records.
    pub tools: usize,
    /// Number of curated docs.
    pub docs: usize,
}

impl Store {
    /// Opens (creating if needed) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if the database cannot be
    /// opened or the schema cannot be initialized (e.g. FTS5 missing).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::StorageUnavailable {
                    cause: format!("cannot create {}: {e}", parent.display()),
                })?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::StorageUnavailable {
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::StorageUnavailable {
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };

        store.initialize()?;
        Ok(store)
    }

    /// Returns the store file path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // WAL for better concurrent read behavior. journal_mode returns a
        // string result which execute_batch would reject, so use pragma_update
        // and ignore the value.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                file TEXT NOT NULL,
                line_start INTEGER NOT NULL,
                line_end INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file);

            CREATE TABLE IF NOT EXISTS indexed_files (
                file TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                source TEXT NOT NULL,
                domain TEXT NOT NULL,
                description TEXT NOT NULL,
                keywords TEXT NOT NULL,
                parameters TEXT NOT NULL,
                examples TEXT NOT NULL,
                priority REAL NOT NULL,
                use_count INTEGER NOT NULL DEFAULT 0,
                last_used INTEGER,
                content_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tools_domain ON tools(domain);

            CREATE TABLE IF NOT EXISTS docs (
                id TEXT PRIMARY KEY,
                tool_name TEXT NOT NULL,
                description TEXT NOT NULL,
                full_documentation TEXT NOT NULL,
                keywords TEXT NOT NULL,
                priority REAL NOT NULL
            );",
        )
        .map_err(|e| Error::StorageUnavailable {
            cause: format!("schema init failed: {e}"),
        })?;

        // FTS5 virtual tables are kept standalone and synced explicitly by
        // the write paths, inside the same transaction as the base tables.
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                id UNINDEXED,
                file UNINDEXED,
                content
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS tools_fts USING fts5(
                id UNINDEXED,
                name,
                description,
                keywords
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS docs_fts USING fts5(
                id UNINDEXED,
                tool_name,
                description,
                keywords,
                full_documentation
            );",
        )
        .map_err(|e| Error::StorageUnavailable {
            cause: format!("FTS5 init failed (SQLite built without FTS5?): {e}"),
        })?;

        Ok(())
    }

    /// Returns aggregate record counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the counting queries fail.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = acquire_lock(&self.conn);
        let count = |table: &str| -> Result<usize> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| usize::try_from(n).unwrap_or(0))
            .map_err(|e| Error::OperationFailed {
                operation: format!("count_{table}"),
                cause: e.to_string(),
            })
        };

        Ok(StoreStats {
            chunks: count("chunks")?,
            files: count("indexed_files")?,
            tools: count("tools")?,
            docs: count("docs")?,
        })
    }

    pub(crate) fn record_operation_metrics(
        operation: &'static str,
        start: Instant,
        status: &'static str,
    ) {
        metrics::counter!(
            "store_operations_total",
            "operation" => operation,
            "status" => status
        )
        .increment(1);
        metrics::histogram!(
            "store_operation_duration_ms",
            "operation" => operation,
            "status" => status
        )
        .record(start.elapsed().as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let store = Store::in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats, StoreStats::default());
        assert!(store.db_path().is_none());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        let store = Store::open(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like_wildcards("normal"), "normal");
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
        assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
        assert_eq!(escape_like_wildcards(""), "");
    }
}
