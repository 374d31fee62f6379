//! Chunk table, chunk FTS index, and the indexed-file registry.

use super::{acquire_lock, escape_like_wildcards, Store};
use crate::models::{Chunk, IndexedFileRecord};
use crate::{Error, Result};
use rusqlite::{params, OptionalExtension, Row};
use std::time::Instant;
use tracing::instrument;

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get(0)?,
        file: row.get(1)?,
        line_start: row.get::<_, i64>(2)?.try_into().unwrap_or(0),
        line_end: row.get::<_, i64>(3)?.try_into().unwrap_or(0),
        chunk_index: row.get::<_, i64>(4)?.try_into().unwrap_or(0),
        content: row.get(5)?,
        content_hash: row.get(6)?,
    })
}

const CHUNK_COLUMNS: &str = "c.id, c.file, c.line_start, c.line_end, c.chunk_index, c.content, c.content_hash";

impl Store {
    /// Atomically replaces the chunk set for one file.
    ///
    /// Old chunks and their FTS rows are deleted, new ones inserted, and the
    /// registry record upserted, all inside one `BEGIN IMMEDIATE`
    /// transaction, so a concurrent reader never observes a half-replaced
    /// file.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction rolls back.
    #[instrument(
        skip(self, chunks),
        fields(operation = "replace_file_chunks", file = %record.file, count = chunks.len())
    )]
    pub fn replace_file_chunks(
        &self,
        record: &IndexedFileRecord,
        chunks: &[Chunk],
    ) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            conn.execute("BEGIN IMMEDIATE", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "begin_transaction".to_string(),
                    cause: e.to_string(),
                })?;

            let result = (|| {
                conn.execute("DELETE FROM chunks WHERE file = ?1", params![record.file])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_chunks".to_string(),
                        cause: e.to_string(),
                    })?;

                conn.execute(
                    "DELETE FROM chunks_fts WHERE file = ?1",
                    params![record.file],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_chunks_fts".to_string(),
                    cause: e.to_string(),
                })?;

                for chunk in chunks {
                    conn.execute(
                        "INSERT INTO chunks (id, file, line_start, line_end, chunk_index, content, content_hash)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            chunk.id,
                            chunk.file,
                            chunk.line_start as i64,
                            chunk.line_end as i64,
                            chunk.chunk_index as i64,
                            chunk.content,
                            chunk.content_hash,
                        ],
                    )
                    .map_err(|e| Error::OperationFailed {
                        operation: "insert_chunk".to_string(),
                        cause: e.to_string(),
                    })?;

                    conn.execute(
                        "INSERT INTO chunks_fts (id, file, content) VALUES (?1, ?2, ?3)",
                        params![chunk.id, chunk.file, chunk.content],
                    )
                    .map_err(|e| Error::OperationFailed {
                        operation: "insert_chunk_fts".to_string(),
                        cause: e.to_string(),
                    })?;
                }

                #[allow(clippy::cast_possible_wrap)]
                conn.execute(
                    "INSERT OR REPLACE INTO indexed_files (file, content_hash, chunk_count, indexed_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.file,
                        record.content_hash,
                        record.chunk_count as i64,
                        record.indexed_at as i64,
                    ],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "upsert_indexed_file".to_string(),
                    cause: e.to_string(),
                })?;

                Ok(())
            })();

            if result.is_ok() {
                conn.execute("COMMIT", [])
                    .map_err(|e| Error::OperationFailed {
                        operation: "commit_transaction".to_string(),
                        cause: e.to_string(),
                    })?;
            } else {
                let _ = conn.execute("ROLLBACK", []);
            }

            result
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("replace_file_chunks", start, status);
        result
    }

    /// Returns the stored content hash for `file`, or `None` if the file has
    /// never been indexed.
    ///
    /// An undecodable registry row is treated as unknown (`None`), which
    /// forces a full re-index of that file on the next run.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup statement fails.
    pub fn file_hash(&self, file: &str) -> Result<Option<String>> {
        let conn = acquire_lock(&self.conn);
        let result: std::result::Result<Option<String>, _> = conn
            .query_row(
                "SELECT content_hash FROM indexed_files WHERE file = ?1",
                params![file],
                |row| row.get(0),
            )
            .optional();

        match result {
            Ok(hash) => Ok(hash),
            Err(e) => {
                tracing::warn!(file, error = %e, "unreadable registry row, treating as changed");
                Ok(None)
            },
        }
    }

    /// Lists all indexed-file registry records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn indexed_files(&self) -> Result<Vec<IndexedFileRecord>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT file, content_hash, chunk_count, indexed_at FROM indexed_files ORDER BY file")
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_indexed_files".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok(IndexedFileRecord {
                    file: row.get(0)?,
                    content_hash: row.get(1)?,
                    chunk_count: row.get::<_, i64>(2)?.try_into().unwrap_or(0),
                    indexed_at: row.get::<_, i64>(3)?.try_into().unwrap_or(0),
                })
            })
            .map_err(|e| Error::OperationFailed {
                operation: "list_indexed_files".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_indexed_file_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Removes a file's chunks and registry record (stale-file pruning).
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction rolls back.
    #[instrument(skip(self), fields(operation = "remove_file", file = file))]
    pub fn remove_file(&self, file: &str) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            conn.execute("BEGIN IMMEDIATE", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "begin_transaction".to_string(),
                    cause: e.to_string(),
                })?;

            let result = (|| {
                conn.execute("DELETE FROM chunks WHERE file = ?1", params![file])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_chunks".to_string(),
                        cause: e.to_string(),
                    })?;
                conn.execute("DELETE FROM chunks_fts WHERE file = ?1", params![file])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_chunks_fts".to_string(),
                        cause: e.to_string(),
                    })?;
                let removed = conn
                    .execute("DELETE FROM indexed_files WHERE file = ?1", params![file])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_indexed_file".to_string(),
                        cause: e.to_string(),
                    })?;
                Ok(removed > 0)
            })();

            if result.is_ok() {
                conn.execute("COMMIT", [])
                    .map_err(|e| Error::OperationFailed {
                        operation: "commit_transaction".to_string(),
                        cause: e.to_string(),
                    })?;
            } else {
                let _ = conn.execute("ROLLBACK", []);
            }

            result
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("remove_file", start, status);
        result
    }

    /// Full-text pass over chunk content.
    ///
    /// The query string is handed to FTS5 `MATCH` as-is; scores are raw
    /// `bm25()` values (negative, ascending = better). A malformed query
    /// surfaces as an error here — the search engine treats that as a
    /// query-syntax failure and falls back to the substring pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to parse or execute.
    #[instrument(
        skip(self, query),
        fields(operation = "search_chunks_fts", query_length = query.len(), limit = limit)
    )]
    pub fn search_chunks_fts(
        &self,
        query: &str,
        limit: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<(Chunk, f64)>> {
        let conn = acquire_lock(&self.conn);

        let sql = format!(
            "SELECT {CHUNK_COLUMNS}, bm25(chunks_fts) AS score
             FROM chunks_fts f
             JOIN chunks c ON c.id = f.id
             WHERE chunks_fts MATCH ?1 {file_clause}
             ORDER BY score
             LIMIT ?{limit_param}",
            file_clause = if file_filter.is_some() { "AND c.file = ?2" } else { "" },
            limit_param = if file_filter.is_some() { 3 } else { 2 },
        );

        let mut stmt = conn.prepare(&sql).map_err(|e| Error::OperationFailed {
            operation: "prepare_search_chunks_fts".to_string(),
            cause: e.to_string(),
        })?;

        let map_row = |row: &Row<'_>| {
            let chunk = chunk_from_row(row)?;
            let score: f64 = row.get(7)?;
            Ok((chunk, score))
        };

        let rows = match file_filter {
            Some(file) => stmt.query_map(params![query, file, limit as i64], map_row),
            None => stmt.query_map(params![query, limit as i64], map_row),
        }
        .map_err(|e| Error::OperationFailed {
            operation: "execute_search_chunks_fts".to_string(),
            cause: e.to_string(),
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_chunk_fts_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Substring-containment pass over chunk content (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to execute.
    #[instrument(
        skip(self, query),
        fields(operation = "search_chunks_substring", query_length = query.len(), limit = limit)
    )]
    pub fn search_chunks_substring(
        &self,
        query: &str,
        limit: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<Chunk>> {
        let conn = acquire_lock(&self.conn);

        let pattern = format!("%{}%", escape_like_wildcards(query));
        let sql = format!(
            "SELECT {CHUNK_COLUMNS}
             FROM chunks c
             WHERE c.content LIKE ?1 ESCAPE '\\' {file_clause}
             ORDER BY c.file, c.chunk_index
             LIMIT ?{limit_param}",
            file_clause = if file_filter.is_some() { "AND c.file = ?2" } else { "" },
            limit_param = if file_filter.is_some() { 3 } else { 2 },
        );

        let mut stmt = conn.prepare(&sql).map_err(|e| Error::OperationFailed {
            operation: "prepare_search_chunks_substring".to_string(),
            cause: e.to_string(),
        })?;

        let rows = match file_filter {
            Some(file) => stmt.query_map(params![pattern, file, limit as i64], chunk_from_row),
            None => stmt.query_map(params![pattern, limit as i64], chunk_from_row),
        }
        .map_err(|e| Error::OperationFailed {
            operation: "execute_search_chunks_substring".to_string(),
            cause: e.to_string(),
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_chunk_substring_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Returns all chunks for one file, ordered by chunk index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn chunks_for_file(&self, file: &str) -> Result<Vec<Chunk>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks c WHERE c.file = ?1 ORDER BY c.chunk_index"
            ))
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_chunks_for_file".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![file], chunk_from_row)
            .map_err(|e| Error::OperationFailed {
                operation: "execute_chunks_for_file".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_chunk_row".to_string(),
                cause: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current_timestamp;

    fn chunk(file: &str, idx: usize, lines: (usize, usize), content: &str) -> Chunk {
        Chunk {
            id: Chunk::make_id(file, lines.0, lines.1, idx),
            file: file.to_string(),
            line_start: lines.0,
            line_end: lines.1,
            chunk_index: idx,
            content: content.to_string(),
            content_hash: hex::encode(sha2::Sha256::digest(content.as_bytes())),
        }
    }

    fn record(file: &str, chunk_count: usize) -> IndexedFileRecord {
        IndexedFileRecord {
            file: file.to_string(),
            content_hash: format!("hash-of-{file}"),
            chunk_count,
            indexed_at: current_timestamp(),
        }
    }

    use sha2::Digest;

    #[test]
    fn test_replace_and_fetch() {
        let store = Store::in_memory().unwrap();
        let chunks = vec![
            chunk("a.md", 0, (1, 5), "stripe webhook handling"),
            chunk("a.md", 1, (4, 9), "retry with backoff"),
        ];
        store.replace_file_chunks(&record("a.md", 2), &chunks).unwrap();

        let fetched = store.chunks_for_file("a.md").unwrap();
        assert_eq!(fetched, chunks);
        assert_eq!(store.file_hash("a.md").unwrap().unwrap(), "hash-of-a.md");
        assert!(store.file_hash("missing.md").unwrap().is_none());
    }

    #[test]
    fn test_replace_is_per_file_isolated() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(&record("a.md", 1), &[chunk("a.md", 0, (1, 2), "alpha")])
            .unwrap();
        store
            .replace_file_chunks(&record("b.md", 1), &[chunk("b.md", 0, (1, 2), "beta")])
            .unwrap();

        // Re-replacing a.md must leave b.md untouched.
        store
            .replace_file_chunks(&record("a.md", 1), &[chunk("a.md", 0, (1, 3), "alpha two")])
            .unwrap();

        assert_eq!(store.chunks_for_file("b.md").unwrap().len(), 1);
        assert_eq!(store.chunks_for_file("a.md").unwrap()[0].content, "alpha two");
        let hits = store.search_chunks_fts("beta", 10, None).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_fts_scores_ascend() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(
                &record("a.md", 2),
                &[
                    chunk("a.md", 0, (1, 2), "webhook webhook webhook retries"),
                    chunk("a.md", 1, (2, 3), "a single webhook mention in much longer text"),
                ],
            )
            .unwrap();

        let hits = store.search_chunks_fts("webhook", 10, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 <= hits[1].1, "bm25 scores must ascend");
        assert!(hits[0].1 < 0.0, "bm25 scores are negative");
    }

    #[test]
    fn test_fts_malformed_query_errors() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(&record("a.md", 1), &[chunk("a.md", 0, (1, 1), "text")])
            .unwrap();
        // Unbalanced quote is an FTS5 syntax error; the engine layer turns
        // this into a substring-only fallback.
        assert!(store.search_chunks_fts("\"unbalanced", 10, None).is_err());
    }

    #[test]
    fn test_substring_pass_finds_partial_tokens() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(
                &record("a.md", 1),
                &[chunk("a.md", 0, (1, 1), "the call was webhooked through")],
            )
            .unwrap();

        let hits = store.search_chunks_substring("webhook", 10, None).unwrap();
        assert_eq!(hits.len(), 1);

        // LIKE wildcards in the query must match literally.
        let hits = store.search_chunks_substring("web%ook", 10, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_file_filter() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(&record("a.md", 1), &[chunk("a.md", 0, (1, 1), "deploy notes")])
            .unwrap();
        store
            .replace_file_chunks(&record("b.md", 1), &[chunk("b.md", 0, (1, 1), "deploy log")])
            .unwrap();

        let hits = store.search_chunks_fts("deploy", 10, Some("b.md")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.file, "b.md");

        let hits = store
            .search_chunks_substring("deploy", 10, Some("a.md"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "a.md");
    }

    #[test]
    fn test_remove_file() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(&record("a.md", 1), &[chunk("a.md", 0, (1, 1), "gone soon")])
            .unwrap();

        assert!(store.remove_file("a.md").unwrap());
        assert!(!store.remove_file("a.md").unwrap());
        assert!(store.chunks_for_file("a.md").unwrap().is_empty());
        assert!(store.search_chunks_fts("gone", 10, None).unwrap().is_empty());
        assert!(store.file_hash("a.md").unwrap().is_none());
    }

    #[test]
    fn test_indexed_files_listing() {
        let store = Store::in_memory().unwrap();
        store
            .replace_file_chunks(&record("b.md", 1), &[chunk("b.md", 0, (1, 1), "b")])
            .unwrap();
        store
            .replace_file_chunks(&record("a.md", 1), &[chunk("a.md", 0, (1, 1), "a")])
            .unwrap();

        let files = store.indexed_files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file, "a.md");
        assert_eq!(files[1].file, "b.md");
        assert_eq!(files[0].chunk_count, 1);
    }
}
