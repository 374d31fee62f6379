//! Tool catalog table and its FTS index.

use super::{acquire_lock, escape_like_wildcards, Store};
use crate::models::{ToolKind, ToolRecord};
use crate::{Error, Result};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use std::time::Instant;
use tracing::instrument;

const TOOL_COLUMNS: &str = "t.id, t.name, t.kind, t.source, t.domain, t.description, \
     t.keywords, t.parameters, t.examples, t.priority, t.use_count, t.last_used, t.content_hash";

fn decode_list(raw: &str, id: &str, field: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        // An undecodable list is an unexpected stored shape; surface it and
        // carry on with an empty list. The hash mismatch on the next sync
        // rewrites the record.
        tracing::warn!(id, field, error = %e, "undecodable tool list field");
        Vec::new()
    })
}

fn tool_from_row(row: &Row<'_>) -> rusqlite::Result<ToolRecord> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let keywords: String = row.get(6)?;
    let parameters: String = row.get(7)?;
    let examples: String = row.get(8)?;
    Ok(ToolRecord {
        name: row.get(1)?,
        kind: ToolKind::parse(&kind),
        source: row.get(3)?,
        domain: row.get(4)?,
        description: row.get(5)?,
        keywords: decode_list(&keywords, &id, "keywords"),
        parameters: decode_list(&parameters, &id, "parameters"),
        examples: decode_list(&examples, &id, "examples"),
        priority: row.get(9)?,
        use_count: row.get::<_, i64>(10)?.try_into().unwrap_or(0),
        last_used: row
            .get::<_, Option<i64>>(11)?
            .and_then(|v| v.try_into().ok()),
        content_hash: row.get(12)?,
        id,
    })
}

fn encode_list(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

impl Store {
    /// Inserts or updates a tool record, preserving learned usage counters.
    ///
    /// `use_count` and `last_used` belong to the recommendation path, not
    /// the sync path, so an update never resets them.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    #[instrument(skip(self, record), fields(operation = "upsert_tool", tool.id = %record.id))]
    pub fn upsert_tool(&self, record: &ToolRecord) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            conn.execute("BEGIN IMMEDIATE", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "begin_transaction".to_string(),
                    cause: e.to_string(),
                })?;

            let result = (|| {
                #[allow(clippy::cast_possible_wrap)]
                conn.execute(
                    "INSERT INTO tools
                        (id, name, kind, source, domain, description, keywords, parameters,
                         examples, priority, use_count, last_used, content_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                     ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        kind = excluded.kind,
                        source = excluded.source,
                        domain = excluded.domain,
                        description = excluded.description,
                        keywords = excluded.keywords,
                        parameters = excluded.parameters,
                        examples = excluded.examples,
                        priority = excluded.priority,
                        content_hash = excluded.content_hash",
                    params![
                        record.id,
                        record.name,
                        record.kind.as_str(),
                        record.source,
                        record.domain,
                        record.description,
                        encode_list(&record.keywords),
                        encode_list(&record.parameters),
                        encode_list(&record.examples),
                        record.priority,
                        record.use_count as i64,
                        record.last_used.map(|v| v as i64),
                        record.content_hash,
                    ],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "upsert_tool".to_string(),
                    cause: e.to_string(),
                })?;

                conn.execute("DELETE FROM tools_fts WHERE id = ?1", params![record.id])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_tool_fts".to_string(),
                        cause: e.to_string(),
                    })?;

                conn.execute(
                    "INSERT INTO tools_fts (id, name, description, keywords)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.id,
                        record.name,
                        record.description,
                        record.keywords.join(" "),
                    ],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "insert_tool_fts".to_string(),
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
        Self::record_operation_metrics("upsert_tool", start, status);
        result
    }

    /// Returns the `(id, content_hash)` map for change detection on re-sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tool_hashes(&self) -> Result<HashMap<String, String>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT id, content_hash FROM tools")
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_tool_hashes".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| Error::OperationFailed {
                operation: "execute_tool_hashes".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_tool_hash_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Fetches one tool record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn get_tool(&self, id: &str) -> Result<Option<ToolRecord>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            &format!("SELECT {TOOL_COLUMNS} FROM tools t WHERE t.id = ?1"),
            params![id],
            tool_from_row,
        )
        .optional()
        .map_err(|e| Error::OperationFailed {
            operation: "get_tool".to_string(),
            cause: e.to_string(),
        })
    }

    /// Full-text pass over tool records (name, description, keywords).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to parse or execute; callers
    /// treat that as a query-syntax failure and fall back to substring.
    #[instrument(
        skip(self, query),
        fields(operation = "search_tools_fts", query_length = query.len(), limit = limit)
    )]
    pub fn search_tools_fts(&self, query: &str, limit: usize) -> Result<Vec<(ToolRecord, f64)>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TOOL_COLUMNS}, bm25(tools_fts) AS score
                 FROM tools_fts f
                 JOIN tools t ON t.id = f.id
                 WHERE tools_fts MATCH ?1
                 ORDER BY score
                 LIMIT ?2"
            ))
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_search_tools_fts".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![query, limit as i64], |row| {
                let record = tool_from_row(row)?;
                let score: f64 = row.get(13)?;
                Ok((record, score))
            })
            .map_err(|e| Error::OperationFailed {
                operation: "execute_search_tools_fts".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_tool_fts_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Substring-containment pass over tool name, description, and keywords.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to execute.
    pub fn search_tools_substring(&self, query: &str, limit: usize) -> Result<Vec<ToolRecord>> {
        let conn = acquire_lock(&self.conn);
        let pattern = format!("%{}%", escape_like_wildcards(query));
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TOOL_COLUMNS}
                 FROM tools t
                 WHERE t.name LIKE ?1 ESCAPE '\\'
                    OR t.description LIKE ?1 ESCAPE '\\'
                    OR t.keywords LIKE ?1 ESCAPE '\\'
                 ORDER BY t.priority DESC, t.id
                 LIMIT ?2"
            ))
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_search_tools_substring".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![pattern, limit as i64], tool_from_row)
            .map_err(|e| Error::OperationFailed {
                operation: "execute_search_tools_substring".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_tool_substring_row".to_string(),
                cause: e.to_string(),
            })
    }

    /// Increments a tool's use count and stamps `last_used`.
    ///
    /// This is the learning signal fed back by `recommend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn increment_tool_use(&self, id: &str, now: u64) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        #[allow(clippy::cast_possible_wrap)]
        conn.execute(
            "UPDATE tools SET use_count = use_count + 1, last_used = ?2 WHERE id = ?1",
            params![id, now as i64],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "increment_tool_use".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Removes tool records whose ids are not in `keep` (descriptors that
    /// disappeared from their provider since the last sync).
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn prune_tools_not_in(&self, keep: &[String]) -> Result<usize> {
        let conn = acquire_lock(&self.conn);

        let existing: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT id FROM tools")
                .map_err(|e| Error::OperationFailed {
                    operation: "prepare_list_tool_ids".to_string(),
                    cause: e.to_string(),
                })?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| Error::OperationFailed {
                    operation: "list_tool_ids".to_string(),
                    cause: e.to_string(),
                })?;
            rows.filter_map(std::result::Result::ok).collect()
        };

        let mut removed = 0;
        for id in existing {
            if keep.contains(&id) {
                continue;
            }
            conn.execute("DELETE FROM tools WHERE id = ?1", params![id])
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_tool".to_string(),
                    cause: e.to_string(),
                })?;
            conn.execute("DELETE FROM tools_fts WHERE id = ?1", params![id])
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_tool_fts".to_string(),
                    cause: e.to_string(),
                })?;
            removed += 1;
        }

        Ok(removed)
    }

    /// Returns per-domain record counts, ordered by domain name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tool_domain_counts(&self) -> Result<Vec<(String, usize)>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT domain, COUNT(*) FROM tools GROUP BY domain ORDER BY domain")
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_tool_domain_counts".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    usize::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                ))
            })
            .map_err(|e| Error::OperationFailed {
                operation: "execute_tool_domain_counts".to_string(),
                cause: e.to_string(),
            })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::OperationFailed {
                operation: "read_domain_count_row".to_string(),
                cause: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(id_name: &str, description: &str, keywords: &[&str]) -> ToolRecord {
        let mut record = ToolRecord {
            id: ToolRecord::make_id("acme", id_name),
            name: id_name.to_string(),
            kind: ToolKind::Integration,
            source: "acme".to_string(),
            domain: "general".to_string(),
            description: description.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            parameters: vec!["amount".to_string()],
            examples: vec![],
            priority: 1.0,
            use_count: 0,
            last_used: None,
            content_hash: String::new(),
        };
        record.content_hash = record.compute_hash();
        record
    }

    #[test]
    fn test_upsert_and_get() {
        let store = Store::in_memory().unwrap();
        let record = tool("create_charge", "Create a new charge", &["charge", "payment"]);
        store.upsert_tool(&record).unwrap();

        let fetched = store.get_tool(&record.id).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert!(store.get_tool("acme__missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_preserves_usage_counters() {
        let store = Store::in_memory().unwrap();
        let record = tool("create_charge", "Create a new charge", &["charge"]);
        store.upsert_tool(&record).unwrap();
        store.increment_tool_use(&record.id, 1_700_000_000).unwrap();

        // Re-sync with a changed description; usage history must survive.
        let mut updated = tool("create_charge", "Create a charge object", &["charge"]);
        updated.content_hash = updated.compute_hash();
        store.upsert_tool(&updated).unwrap();

        let fetched = store.get_tool(&record.id).unwrap().unwrap();
        assert_eq!(fetched.use_count, 1);
        assert_eq!(fetched.last_used, Some(1_700_000_000));
        assert_eq!(fetched.description, "Create a charge object");
    }

    #[test]
    fn test_search_fts_and_substring() {
        let store = Store::in_memory().unwrap();
        store
            .upsert_tool(&tool("create_charge", "Create a charge", &["charge", "payment"]))
            .unwrap();
        store
            .upsert_tool(&tool("send_sms", "Send a text message", &["sms", "message"]))
            .unwrap();

        let hits = store.search_tools_fts("payment OR charge", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.name, "create_charge");

        let hits = store.search_tools_substring("messag", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "send_sms");
    }

    #[test]
    fn test_tool_hashes_and_prune() {
        let store = Store::in_memory().unwrap();
        let a = tool("a", "first", &[]);
        let b = tool("b", "second", &[]);
        store.upsert_tool(&a).unwrap();
        store.upsert_tool(&b).unwrap();

        let hashes = store.tool_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes.get(&a.id), Some(&a.content_hash));

        let removed = store.prune_tools_not_in(&[a.id.clone()]).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_tool(&b.id).unwrap().is_none());
        assert!(store.search_tools_fts("second", 10).unwrap().is_empty());
    }

    #[test]
    fn test_domain_counts() {
        let store = Store::in_memory().unwrap();
        let mut a = tool("a", "charge", &[]);
        a.domain = "payments".to_string();
        let mut b = tool("b", "charge harder", &[]);
        b.domain = "payments".to_string();
        let c = tool("c", "misc", &[]);
        store.upsert_tool(&a).unwrap();
        store.upsert_tool(&b).unwrap();
        store.upsert_tool(&c).unwrap();

        let counts = store.tool_domain_counts().unwrap();
        assert_eq!(counts, vec![("general".to_string(), 1), ("payments".to_string(), 2)]);
    }
}
