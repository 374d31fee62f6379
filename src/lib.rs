//! # Mnemo
//!
//! A persistent-memory retrieval engine for AI coding agents.
//!
//! Mnemo incrementally indexes a corpus of markdown knowledge files
//! (curated notes, dated activity logs, capability catalogs) into chunked,
//! searchable records and serves ranked excerpts back to a calling agent.
//!
//! ## Features
//!
//! - Content-addressed incremental re-indexing (unchanged files are no-ops)
//! - Hybrid ranking: FTS5 BM25 pass merged with a substring fallback pass
//! - Session expansion for dated activity logs, with deduplication and a
//!   condensed summary view
//! - Tool catalog with keyword extraction, domain classification, and
//!   learned usage-based recommendation
//! - Curated documentation retrieval kept out of agent context until asked
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemo::{HybridSearchEngine, MnemoConfig, Store};
//!
//! let config = MnemoConfig::default().with_base_dir(".mnemo");
//! let store = Store::open(config.db_path())?;
//! let engine = HybridSearchEngine::new(&store);
//! let hits = engine.search("webhook retries", 10, None)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod catalog;
pub mod config;
pub mod docs;
pub mod indexer;
pub mod models;
pub mod search;
pub mod storage;

// Re-exports for convenience
pub use catalog::ToolCatalog;
pub use config::MnemoConfig;
pub use docs::DocRetriever;
pub use indexer::{IndexSummary, Indexer};
pub use models::{
    Chunk, ChunkHit, CuratedDoc, DocHit, IndexedFileRecord, MatchKind, Recommendation,
    RetrievalMode, SearchOutput, Session, SessionHit, ToolKind, ToolRecord,
};
pub use search::{HybridSearchEngine, Retriever, SessionExpander};
pub use storage::Store;

/// Error type for mnemo operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `StorageUnavailable` | The embedded store cannot be opened or lacks FTS5 |
/// | `OperationFailed` | I/O errors, database statement failures |
/// | `InvalidInput` | Malformed configuration or catalog descriptors |
///
/// Query-syntax failures in the full-text engine are never surfaced as
/// errors; the search path recovers locally via substring fallback.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The embedded store is missing or unusable.
    ///
    /// Fatal for `index` and `sync` commands. Read paths degrade to empty
    /// results where feasible.
    #[error("storage unavailable: {cause} (is the store path writable and FTS5 compiled in?)")]
    StorageUnavailable {
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail to prepare or execute
    /// - Filesystem I/O errors occur outside the skip-and-warn path
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The config file cannot be parsed
    /// - An integration descriptor is malformed beyond recovery
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for mnemo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every component stamps records the same way. Falls back
/// to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
