//! Tool catalog: descriptor ingestion, keyword extraction, domain
//! classification, and learned recommendation.
//!
//! `sync` rebuilds the catalog from on-disk descriptors with hash-gated
//! writes so unchanged records keep their usage counters. `recommend` ranks
//! records against a task string and feeds every returned suggestion back
//! into its usage counter.

pub mod domain;
pub mod ingest;
pub mod keywords;

use crate::config::MnemoConfig;
use crate::models::{Recommendation, ToolKind, ToolRecord};
use crate::storage::Store;
use crate::{current_timestamp, Result};
use ingest::RawTool;
use keywords::{extract_task_keywords, extract_tool_keywords};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Base priority for every record.
const PRIORITY_BASE: f64 = 1.0;

/// Priority bonus for integration-backed records.
const PRIORITY_INTEGRATION_BONUS: f64 = 0.5;

/// Priority bonus for records classified into a non-general domain.
const PRIORITY_DOMAIN_BONUS: f64 = 0.3;

/// Keyword-overlap weight in the recommendation score.
const OVERLAP_WEIGHT: f64 = 2.0;

/// Usage-count weight in the recommendation score.
const USE_COUNT_WEIGHT: f64 = 0.1;

/// Maximum task keywords joined into the full-text query.
const MAX_QUERY_KEYWORDS: usize = 8;

/// Outcome counts for one catalog sync.
#[derive(Debug, Default)]
pub struct SyncSummary {
    /// Records inserted or rewritten.
    pub written: usize,
    /// Records whose hash matched the stored one.
    pub skipped: usize,
    /// Stale records removed.
    pub removed: usize,
    /// Per-domain record counts after the sync, ordered by domain.
    pub domain_counts: Vec<(String, usize)>,
}

/// Catalog facade over the store and on-disk descriptors.
pub struct ToolCatalog<'a> {
    store: &'a Store,
    config: &'a MnemoConfig,
}

impl<'a> ToolCatalog<'a> {
    /// Creates a catalog over `store` with the given configuration.
    #[must_use]
    pub const fn new(store: &'a Store, config: &'a MnemoConfig) -> Self {
        Self { store, config }
    }

    /// Normalizes a raw descriptor into a full record: extracted keywords,
    /// domain label, static priority, and change-detection hash.
    fn normalize(&self, raw: RawTool) -> ToolRecord {
        let keywords =
            extract_tool_keywords(self.config, &raw.name, &raw.description, &raw.parameters);
        let classification_text =
            format!("{} {} {}", raw.name, raw.description, keywords.join(" "));
        let domain = domain::classify(&self.config.domain_table, &classification_text);

        let mut priority = PRIORITY_BASE;
        if raw.kind == ToolKind::Integration {
            priority += PRIORITY_INTEGRATION_BONUS;
        }
        if domain != "general" {
            priority += PRIORITY_DOMAIN_BONUS;
        }

        let mut record = ToolRecord {
            id: ToolRecord::make_id(&raw.provider, &raw.name),
            name: raw.name,
            kind: raw.kind,
            source: raw.source,
            domain,
            description: raw.description,
            keywords,
            parameters: raw.parameters,
            examples: raw.examples,
            priority,
            use_count: 0,
            last_used: None,
            content_hash: String::new(),
        };
        record.content_hash = record.compute_hash();
        record
    }

    /// Rebuilds the catalog from on-disk descriptors.
    ///
    /// Unchanged records (same id and hash) are skipped so their usage
    /// counters survive; records no longer described on disk are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    #[instrument(skip(self), fields(operation = "catalog_sync"))]
    pub fn sync(&self) -> Result<SyncSummary> {
        let existing = self.store.tool_hashes()?;
        let mut summary = SyncSummary::default();
        let mut keep: Vec<String> = Vec::new();

        for raw in ingest::discover(&self.config.base_dir) {
            let record = self.normalize(raw);
            keep.push(record.id.clone());

            if existing.get(&record.id) == Some(&record.content_hash) {
                summary.skipped += 1;
                continue;
            }
            debug!(id = %record.id, domain = %record.domain, "writing tool record");
            self.store.upsert_tool(&record)?;
            summary.written += 1;
        }

        summary.removed = self.store.prune_tools_not_in(&keep)?;
        summary.domain_counts = self.store.tool_domain_counts()?;

        info!(
            written = summary.written,
            skipped = summary.skipped,
            removed = summary.removed,
            "catalog sync complete"
        );
        metrics::counter!("catalog_records_written_total").increment(summary.written as u64);
        Ok(summary)
    }

    /// Ranks catalog records against a free-form task string.
    ///
    /// Candidates come from a full-text query over the top task keywords,
    /// topped up by per-keyword substring matches. Each candidate is scored
    /// `overlap * 2.0 + priority + use_count * 0.1` and the score is squashed
    /// into a `[0, 1)` confidence. Every returned record has its usage
    /// counter incremented, which feeds future rankings.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the usage counters
    /// cannot be written.
    #[allow(clippy::cast_precision_loss)]
    #[instrument(skip(self, task), fields(operation = "recommend", task_length = task.len(), limit = limit))]
    pub fn recommend(&self, task: &str, limit: usize) -> Result<Vec<Recommendation>> {
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

        let mut pool: Vec<ToolRecord> = match self.store.search_tools_fts(&query, candidates) {
            Ok(hits) => hits.into_iter().map(|(record, _)| record).collect(),
            Err(e) => {
                debug!(error = %e, "tool full-text query failed, substring-only fallback");
                metrics::counter!("recommend_fts_fallback_total").increment(1);
                Vec::new()
            },
        };

        if pool.len() < candidates {
            let mut seen: HashSet<String> = pool.iter().map(|r| r.id.clone()).collect();
            for keyword in &task_keywords {
                if pool.len() >= candidates {
                    break;
                }
                for record in self.store.search_tools_substring(keyword, candidates)? {
                    if pool.len() >= candidates {
                        break;
                    }
                    if seen.insert(record.id.clone()) {
                        pool.push(record);
                    }
                }
            }
        }

        let mut ranked: Vec<Recommendation> = pool
            .into_iter()
            .map(|record| {
                let matched_keywords: Vec<String> = task_keywords
                    .iter()
                    .filter(|k| record.keywords.iter().any(|rk| rk == *k))
                    .cloned()
                    .collect();
                let score = matched_keywords.len() as f64 * OVERLAP_WEIGHT
                    + record.priority
                    + record.use_count as f64 * USE_COUNT_WEIGHT;
                Recommendation {
                    confidence: score / (1.0 + score),
                    record,
                    matched_keywords,
                }
            })
            .collect();

        // Descending confidence; id breaks ties so rankings are stable
        // across runs against the same catalog state.
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        ranked.truncate(limit);

        let now = current_timestamp();
        for recommendation in &ranked {
            self.store.increment_tool_use(&recommendation.record.id, now)?;
        }

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const INTEGRATIONS: &str = r#"{
        "stripe": {
            "description": "Payment processing",
            "operations": [
                {
                    "name": "create_checkout",
                    "description": "Create a Stripe checkout session for a payment",
                    "parameters": ["amount", "currency"]
                }
            ]
        },
        "vapi": {
            "description": "Start and manage voice calls over the phone",
            "operations": [
                {"name": "start_call", "description": "Start an outbound voice call"}
            ]
        }
    }"#;

    fn fixture() -> (TempDir, MnemoConfig, Store) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("integrations.json"), INTEGRATIONS).unwrap();
        let config = MnemoConfig::default().with_base_dir(dir.path());
        let store = Store::in_memory().unwrap();
        (dir, config, store)
    }

    #[test]
    fn test_sync_writes_then_skips() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);

        let first = catalog.sync().unwrap();
        assert_eq!(first.written, 2);
        assert_eq!(first.skipped, 0);

        let second = catalog.sync().unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.skipped, 2);
    }

    #[test]
    fn test_sync_classifies_and_prioritizes() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();

        let stripe = store.get_tool("stripe__create_checkout").unwrap().unwrap();
        assert_eq!(stripe.domain, "payments");
        // Base 1.0 + integration 0.5 + non-general domain 0.3.
        assert!((stripe.priority - 1.8).abs() < f64::EPSILON);
        assert!(stripe.keywords.contains(&"checkout".to_string()));
        assert!(stripe.keywords.contains(&"stripe".to_string()));

        let vapi = store.get_tool("vapi__start_call").unwrap().unwrap();
        assert_eq!(vapi.domain, "communication");
    }

    #[test]
    fn test_sync_removes_stale_records() {
        let (dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();

        fs::write(
            dir.path().join("integrations.json"),
            r#"{"stripe": {"description": "Payment processing", "operations": [
                {"name": "create_checkout", "description": "Create a Stripe checkout session for a payment",
                 "parameters": ["amount", "currency"]}
            ]}}"#,
        )
        .unwrap();

        let summary = catalog.sync().unwrap();
        assert_eq!(summary.removed, 1);
        assert!(store.get_tool("vapi__start_call").unwrap().is_none());
    }

    #[test]
    fn test_recommend_prefers_domain_match() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();

        // Both records match at least one keyword, so both come back; the
        // payments-domain record must rank strictly higher.
        let recommendations = catalog
            .recommend("create a stripe checkout payment and call the customer", 5)
            .unwrap();
        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].record.id, "stripe__create_checkout");
        assert_eq!(recommendations[1].record.id, "vapi__start_call");
        assert!(recommendations[0].confidence > recommendations[1].confidence);
        assert!(recommendations[0]
            .matched_keywords
            .contains(&"checkout".to_string()));
    }

    #[test]
    fn test_recommend_increments_usage() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();

        catalog.recommend("start a voice call", 1).unwrap();
        let vapi = store.get_tool("vapi__start_call").unwrap().unwrap();
        assert_eq!(vapi.use_count, 1);
        assert!(vapi.last_used.is_some());
    }

    #[test]
    fn test_usage_survives_resync() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();
        catalog.recommend("stripe checkout", 1).unwrap();

        catalog.sync().unwrap();
        let stripe = store.get_tool("stripe__create_checkout").unwrap().unwrap();
        assert_eq!(stripe.use_count, 1);
    }

    #[test]
    fn test_recommend_order_is_deterministic() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();

        let task = "create a stripe checkout payment and call the customer";
        let first: Vec<String> = catalog
            .recommend(task, 5)
            .unwrap()
            .into_iter()
            .map(|r| r.record.id)
            .collect();
        // Every returned record's counter moved by the same amount, so the
        // relative order is stable across repeated calls.
        let second: Vec<String> = catalog
            .recommend(task, 5)
            .unwrap()
            .into_iter()
            .map(|r| r.record.id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_recommend_empty_task() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();
        assert!(catalog.recommend("a an of", 5).unwrap().is_empty());
        assert!(catalog.recommend("stripe", 0).unwrap().is_empty());
    }

    #[test]
    fn test_recommend_substring_fallback_for_partial_tokens() {
        let (_dir, config, store) = fixture();
        let catalog = ToolCatalog::new(&store, &config);
        catalog.sync().unwrap();

        // "checkou" is not a full token, so only the substring pass finds it.
        let recommendations = catalog.recommend("checkou flow", 5).unwrap();
        assert!(recommendations
            .iter()
            .any(|r| r.record.id == "stripe__create_checkout"));
    }
}
