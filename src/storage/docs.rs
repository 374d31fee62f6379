//! Curated documentation table and its FTS index.

use super::{acquire_lock, escape_like_wildcards, Store};
use crate::models::CuratedDoc;
use crate::{Error, Result};
use rusqlite::{params, Row};
use tracing::instrument;

const DOC_COLUMNS: &str = "d.id, d.tool_name, d.description, d.full_documentation, d.keywords, d.priority";

fn doc_from_row(row: &Row<'_>) -> rusqlite::Result<CuratedDoc> {
    let id: String = row.get(0)?;
    let keywords: String = row.get(4)?;
    Ok(CuratedDoc {
        tool_name: row.get(1)?,
        description: row.get(2)?,
        full_documentation: row.get(3)?,
        keywords: serde_json::from_str(&keywords).unwrap_or_else(|e| {
            tracing::warn!(id, error = %e, "undecodable doc keywords");
            Vec::new()
        }),
        priority: row.get(5)?,
        id,
    })
}

impl Store {
    /// Replaces the whole curated-doc set in one transaction.
    ///
    /// Curated docs are static reference data refreshed only by explicit
    /// re-authoring runs, so wholesale replacement is the natural shape.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction rolls back.
    #[instrument(skip(self, docs), fields(operation = "replace_docs", count = docs.len()))]
    pub fn replace_docs(&self, docs: &[CuratedDoc]) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::OperationFailed {
                operation: "begin_transaction".to_string(),
                cause: e.to_string(),
            })?;

        let result = (|| {
            conn.execute("DELETE FROM docs", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "clear_docs".to_string(),
                    cause: e.to_string(),
                })?;
            conn.execute("DELETE FROM docs_fts", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "clear_docs_fts".to_string(),
                    cause: e.to_string(),
                })?;

            for doc in docs {
                let keywords_json =
                    serde_json::to_string(&doc.keywords).unwrap_or_else(|_| "[]".to_string());
                conn.execute(
                    "INSERT INTO docs (id, tool_name, description, full_documentation, keywords, priority)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        doc.id,
                        doc.tool_name,
                        doc.description,
                        doc.full_documentation,
                        keywords_json,
                        doc.priority,
                    ],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "insert_doc".to_string(),
                    cause: e.to_string(),
                })?;

                conn.execute(
                    "INSERT INTO docs_fts (id, tool_name, description, keywords, full_documentation)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        doc.id,
                        doc.tool_name,
                        doc.description,
                        doc.keywords.join(" "),
                        doc.full_documentation,
                    ],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "insert_doc_fts".to_string(),
                    cause: e.to_string(),
                })?;
            }

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
    }

    /// Full-text pass over curated docs.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to parse or execute; callers
    /// treat that as a query-syntax failure and fall back to substring.
    pub fn search_docs_fts(&self, query: &str, limit: usize) -> Result<Vec<(CuratedDoc, f64)>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOC_COLUMNS}, bm25(docs_fts) AS score
                 FROM docs_fts f
                 JOIN docs d ON d.id = f.id
                 WHERE docs_fts MATCH ?1
                 ORDER BY score
                 LIMIT ?2"
            ))
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_search_docs_fts".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![query, limit as i64], |row| {
                let doc = doc_from_row(row)?;
                let score: f64 = row.get(6)?;
                Ok((doc, score))
            })
            .map_err(|e| Error::OperationFailed {
                operation: "execute_search_docs_fts".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_doc_fts_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Substring-containment pass over curated docs.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to execute.
    pub fn search_docs_substring(&self, query: &str, limit: usize) -> Result<Vec<CuratedDoc>> {
        let conn = acquire_lock(&self.conn);
        let pattern = format!("%{}%", escape_like_wildcards(query));
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOC_COLUMNS}
                 FROM docs d
                 WHERE d.tool_name LIKE ?1 ESCAPE '\\'
                    OR d.description LIKE ?1 ESCAPE '\\'
                    OR d.keywords LIKE ?1 ESCAPE '\\'
                 ORDER BY d.priority DESC, d.id
                 LIMIT ?2"
            ))
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_search_docs_substring".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![pattern, limit as i64], doc_from_row)
            .map_err(|e| Error::OperationFailed {
                operation: "execute_search_docs_substring".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_doc_substring_row".to_string(),
                cause: e.to_string(),
            })
    }
}
