//! End-to-end pipeline tests: index a corpus on disk, search it in every
//! retrieval mode, then sync and query the tool catalog and curated docs
//! against the same store.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use mnemo::{
    DocRetriever, Indexer, MnemoConfig, RetrievalMode, Retriever, Store, ToolCatalog,
};
use std::fs;
use tempfile::TempDir;

const DATED_LOG: &str = "\
## 09:15 standup
agreed to retry failed webhooks with exponential backoff
### Decisions
webhook retries capped at five attempts
### Notes
coffee machine still broken
## 14:00 incident review
traced the outage to a missing index
### Insights
slow queries were all missing the file column index
";

const NOTES: &str = "\
# Deployment notes

The staging environment mirrors production except for webhook
endpoints, which point at a local sink.
";

/// Builds a base directory with a corpus, integration descriptors, and
/// curated docs, mirroring a real agent workspace.
fn fixture() -> (TempDir, MnemoConfig) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let base = dir.path();

    let corpus = base.join("memory");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("2026-08-20.md"), DATED_LOG).unwrap();
    fs::write(corpus.join("deployment.md"), NOTES).unwrap();

    fs::write(
        base.join("integrations.json"),
        r#"{
            "stripe": {
                "description": "Payment processing",
                "operations": [
                    {"name": "create_checkout", "description": "Create a Stripe checkout session", "parameters": ["amount"]}
                ]
            }
        }"#,
    )
    .unwrap();

    let docs = base.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("stripe-checkout.md"),
        "---\ntool: stripe\ndescription: Checkout API reference\nkeywords: stripe, checkout\npriority: 2.0\n---\nCheckout sessions expire after 24 hours.\n",
    )
    .unwrap();

    let config = MnemoConfig::default().with_base_dir(base);
    (dir, config)
}

#[test]
fn test_index_search_expand_pipeline() {
    let (_dir, config) = fixture();
    let store = Store::open(config.db_path()).expect("Failed to open store");

    let indexer = Indexer::new(&store, &config);
    let summary = indexer
        .index_directory(&config.corpus_path(), false)
        .expect("Indexing failed");
    assert_eq!(summary.indexed(), 2);
    assert_eq!(summary.failed(), 0);

    let retriever = Retriever::new(&store, &config);

    // Session mode: the dated-log hit expands to its enclosing session,
    // the plain note stays a chunk hit.
    let output = retriever
        .retrieve("webhook", 10, None, RetrievalMode::Session)
        .unwrap();
    assert!(!output.sessions.is_empty());
    let standup = &output.sessions[0].session;
    assert_eq!(standup.file, "2026-08-20.md");
    assert_eq!(standup.name, "09:15 standup");
    assert!(standup.content.contains("exponential backoff"));
    assert!(output
        .chunks
        .iter()
        .all(|hit| hit.chunk.file == "deployment.md"));

    // Context mode condenses to high-value subsections.
    let output = retriever
        .retrieve("webhook", 10, Some("2026-08-20.md"), RetrievalMode::Context)
        .unwrap();
    let condensed = &output.sessions[0].session.content;
    assert!(condensed.contains("### Decisions"));
    assert!(!condensed.contains("coffee machine"));

    // Chunk mode bypasses expansion entirely.
    let output = retriever
        .retrieve("webhook", 10, None, RetrievalMode::Chunk)
        .unwrap();
    assert!(output.sessions.is_empty());
    assert!(!output.chunks.is_empty());
}

#[test]
fn test_reindex_is_incremental() {
    let (dir, config) = fixture();
    let store = Store::open(config.db_path()).expect("Failed to open store");
    let indexer = Indexer::new(&store, &config);

    indexer.index_directory(&config.corpus_path(), false).unwrap();
    let second = indexer.index_directory(&config.corpus_path(), false).unwrap();
    assert_eq!(second.indexed(), 0);
    assert_eq!(second.skipped(), 2);

    // Touching one file re-indexes only that file.
    fs::write(
        dir.path().join("memory").join("deployment.md"),
        "# Deployment notes\n\nrewritten\n",
    )
    .unwrap();
    let third = indexer.index_directory(&config.corpus_path(), false).unwrap();
    assert_eq!(third.indexed(), 1);
    assert_eq!(third.skipped(), 1);
}

#[test]
fn test_force_prunes_deleted_files() {
    let (dir, config) = fixture();
    let store = Store::open(config.db_path()).expect("Failed to open store");
    let indexer = Indexer::new(&store, &config);
    indexer.index_directory(&config.corpus_path(), false).unwrap();

    fs::remove_file(dir.path().join("memory").join("deployment.md")).unwrap();
    let summary = indexer.index_directory(&config.corpus_path(), true).unwrap();
    assert_eq!(summary.pruned, 1);

    let stats = store.stats().unwrap();
    assert_eq!(stats.files, 1);
}

#[test]
fn test_catalog_and_docs_share_the_store() {
    let (_dir, config) = fixture();
    let store = Store::open(config.db_path()).expect("Failed to open store");

    let catalog = ToolCatalog::new(&store, &config);
    let summary = catalog.sync().unwrap();
    assert_eq!(summary.written, 1);
    assert_eq!(summary.domain_counts, vec![("payments".to_string(), 1)]);

    let docs = DocRetriever::new(&store, &config);
    assert_eq!(docs.sync().unwrap(), 1);

    let recommendations = catalog.recommend("set up a stripe checkout", 5).unwrap();
    assert_eq!(recommendations[0].record.id, "stripe__create_checkout");
    assert!(recommendations[0].confidence > 0.0 && recommendations[0].confidence < 1.0);

    let hits = docs.retrieve("stripe checkout expiry", 5).unwrap();
    assert_eq!(hits[0].doc.tool_name, "stripe");
    assert!(hits[0].doc.full_documentation.contains("24 hours"));

    let stats = store.stats().unwrap();
    assert_eq!(stats.tools, 1);
    assert_eq!(stats.docs, 1);
}

#[test]
fn test_store_persists_across_reopen() {
    let (_dir, config) = fixture();
    {
        let store = Store::open(config.db_path()).expect("Failed to open store");
        let indexer = Indexer::new(&store, &config);
        indexer.index_directory(&config.corpus_path(), false).unwrap();
    }

    let store = Store::open(config.db_path()).expect("Failed to reopen store");
    let retriever = Retriever::new(&store, &config);
    let output = retriever
        .retrieve("outage", 10, None, RetrievalMode::Session)
        .unwrap();
    assert!(!output.sessions.is_empty());
    assert_eq!(output.sessions[0].session.file, "2026-08-20.md");
}
