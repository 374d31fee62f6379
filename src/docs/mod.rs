//! Curated documentation: authored reference entries retrieved on demand.
//!
//! Docs live as `docs/*.md` files under the base directory and are
//! re-ingested wholesale by `sync`. Retrieval mirrors the recommendation
//! read path (keywords, full-text query, substring fallback, overlap and
//! priority re-score) but never mutates anything.

use crate::catalog::ingest::parse_frontmatter;
use crate::catalog::keywords::extract_task_keywords;
use crate::config::MnemoConfig;
use crate::models::{CuratedDoc, DocHit};
use crate::storage::Store;
use crate::Result;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Keyword-overlap weight in the retrieval score.
const OVERLAP_WEIGHT: f64 = 2.0;

/// Maximum task keywords joined into the full-text query.
const MAX_QUERY_KEYWORDS: usize = 8;

/// Facade over curated doc ingestion and retrieval.
pub struct DocRetriever<'a> {
    store: &'a Store,
    config: &'a MnemoConfig,
}

impl<'a> DocRetriever<'a> {
    /// Creates a retriever over `store` with the given configuration.
    #[must_use]
    pub const fn new(store: &'a Store, config: &'a MnemoConfig) -> Self {
        Self { store, config }
    }

    /// Re-ingests all curated docs from `docs/*.md`, replacing the stored
    /// set wholesale. Returns the number of docs ingested.
    ///
    /// Frontmatter fields: `tool:` (falls back to the file stem),
    /// `description:` (falls back to the first body line), `keywords:`
    /// (comma-separated), `priority:` (defaults to 1.0). The body after the
    /// frontmatter is the full documentation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    #[instrument(skip(self), fields(operation = "docs_sync"))]
    pub fn sync(&self) -> Result<usize> {
        let dir = self.config.base_dir.join("docs");
        let mut paths: Vec<_> = match std::fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "docs directory unreadable");
                Vec::new()
            },
        };
        paths.sort();

        let mut docs: Vec<CuratedDoc> = Vec::new();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable doc");
                    continue;
                },
            };

            let (fields, body) = parse_frontmatter(&text);
            let tool_name = fields
                .get("tool")
                .cloned()
                .unwrap_or_else(|| stem.to_string());
            let description = fields.get("description").cloned().unwrap_or_else(|| {
                body.lines()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or_default()
                    .trim_start_matches('#')
                    .trim()
                    .to_string()
            });
            let keywords: Vec<String> = fields
                .get("keywords")
                .map(|raw| {
                    raw.split(',')
                        .map(|k| k.trim().to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let priority = fields
                .get("priority")
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(1.0);

            docs.push(CuratedDoc {
                id: stem.to_lowercase(),
                tool_name,
                description,
                full_documentation: body.trim().to_string(),
                keywords,
                priority,
            });
        }

        self.store.replace_docs(&docs)?;
        info!(count = docs.len(), "curated docs ingested");
        Ok(docs.len())
    }

    /// Ranks curated docs against a free-form task string. Read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[allow(clippy::cast_precision_loss)]
    #[instrument(skip(self, task), fields(operation = "docs_retrieve", task_length = task.len(), limit = limit))]
    pub fn retrieve(&self, task: &str, limit: usize) -> Result<Vec<DocHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let task_keywords = extract_task_keywords(self.config, task);
        if task_keywords.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = limit * 2;
        let query = task_keywords
            .iter()
            .take(MAX_QUERY_KEYWORDS)
            .cloned()
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut pool: Vec<CuratedDoc> = match self.store.search_docs_fts(&query, candidates) {
            Ok(hits) => hits.into_iter().map(|(doc, _)| doc).collect(),
            Err(e) => {
                debug!(error = %e, "doc full-text query failed, substring-only fallback");
                metrics::counter!("docs_fts_fallback_total").increment(1);
                Vec::new()
            },
        };

        if pool.len() < candidates {
            let mut seen: HashSet<String> = pool.iter().map(|doc| doc.id.clone()).collect();
            for keyword in &task_keywords {
                if pool.len() >= candidates {
                    break;
                }
                for doc in self.store.search_docs_substring(keyword, candidates)? {
                    if pool.len() >= candidates {
                        break;
                    }
                    if seen.insert(doc.id.clone()) {
                        pool.push(doc);
                    }
                }
            }
        }

        let mut hits: Vec<DocHit> = pool
            .into_iter()
            .map(|doc| {
                let overlap = task_keywords
                    .iter()
                    .filter(|k| {
                        doc.keywords.iter().any(|dk| dk == *k)
                            || doc.tool_name.to_lowercase().contains(k.as_str())
                    })
                    .count();
                let score = overlap as f64 * OVERLAP_WEIGHT + doc.priority;
                DocHit { doc, score }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc.id.cmp(&b.doc.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
