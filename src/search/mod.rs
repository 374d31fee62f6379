//! Hybrid two-pass search and the retrieval facade.
//!
//! The full-text pass (FTS5, BM25 scores: negative, ascending = better)
//! carries most of the ranking weight; a substring-containment pass catches
//! partial-token matches the tokenizer misses. Malformed full-text queries
//! are recovered locally by falling back to substring-only — callers never
//! see an error for that case.

pub mod session;

pub use session::SessionExpander;

use crate::config::MnemoConfig;
use crate::models::{ChunkHit, MatchKind, RetrievalMode, SearchOutput, SessionHit};
use crate::storage::Store;
use crate::Result;
use std::collections::HashMap;
use tracing::instrument;

/// Weight applied to full-text BM25 scores.
const FTS_WEIGHT: f64 = 0.7;

/// Weight applied to the substring placeholder score.
const SUBSTRING_WEIGHT: f64 = 0.3;

/// Placeholder score for hits found only by the substring pass: ranked
/// behind strong full-text hits but still present.
const SUBSTRING_PLACEHOLDER: f64 = -1.0;

/// Boost factor for chunks matched by both passes.
const BOTH_BOOST: f64 = 1.2;

/// Ranks chunks against a query using a full-text pass merged with a
/// substring-fallback pass.
pub struct HybridSearchEngine<'a> {
    store: &'a Store,
}

impl<'a> HybridSearchEngine<'a> {
    /// Creates an engine over `store`.
    #[must_use]
    pub const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Runs both passes and merges them into one ranked list.
    ///
    /// Merge rule: full-text hits keep `bm25 * 0.7`; substring-only hits get
    /// the fixed placeholder scaled by `0.3`; a chunk in both passes is
    /// boosted 20% — clamped so it never ranks worse than it would as a
    /// substring-only hit. Ascending stable sort (full-text hits first in
    /// construction order), truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the substring pass itself fails; a failing
    /// full-text query degrades silently to substring-only.
    #[instrument(skip(self, query), fields(operation = "hybrid_search", query_length = query.len(), limit = limit))]
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<ChunkHit>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let candidates = limit * 2;

        let fts_hits = match self.store.search_chunks_fts(query, candidates, file_filter) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::debug!(error = %e, "full-text query failed, substring-only fallback");
                metrics::counter!("search_fts_fallback_total").increment(1);
                Vec::new()
            },
        };

        let substring_hits = self
            .store
            .search_chunks_substring(query, candidates, file_filter)?;

        let mut hits: Vec<ChunkHit> = Vec::with_capacity(fts_hits.len() + substring_hits.len());
        let mut position: HashMap<String, usize> = HashMap::with_capacity(fts_hits.len());

        for (chunk, score) in fts_hits {
            position.insert(chunk.id.clone(), hits.len());
            hits.push(ChunkHit {
                chunk,
                score: score * FTS_WEIGHT,
                match_kind: MatchKind::FullText,
            });
        }

        let placeholder = SUBSTRING_PLACEHOLDER * SUBSTRING_WEIGHT;
        for chunk in substring_hits {
            if let Some(&i) = position.get(&chunk.id) {
                hits[i].score = hits[i].score.min(placeholder) * BOTH_BOOST;
                hits[i].match_kind = MatchKind::Both;
            } else {
                hits.push(ChunkHit {
                    chunk,
                    score: placeholder,
                    match_kind: MatchKind::Substring,
                });
            }
        }

        // Stable sort keeps merge-construction order on ties.
        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Single retrieval facade dispatching the chunk/session/context modes.
pub struct Retriever<'a> {
    store: &'a Store,
    config: &'a MnemoConfig,
}

impl<'a> Retriever<'a> {
    /// Creates a retriever over `store` with the given configuration.
    #[must_use]
    pub const fn new(store: &'a Store, config: &'a MnemoConfig) -> Self {
        Self { store, config }
    }

    /// Searches and shapes the result per `mode`.
    ///
    /// In session and context modes, hits inside dated logs expand to their
    /// enclosing session (deduplicated per `(file, session)`), while hits in
    /// other files pass through as chunk-level hits.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying search fails.
    pub fn retrieve(
        &self,
        query: &str,
        limit: usize,
        file_filter: Option<&str>,
        mode: RetrievalMode,
    ) -> Result<SearchOutput> {
        let engine = HybridSearchEngine::new(self.store);
        let hits = engine.search(query, limit, file_filter)?;

        if mode == RetrievalMode::Chunk {
            return Ok(SearchOutput {
                sessions: Vec::new(),
                chunks: hits,
            });
        }

        let expander = SessionExpander::new(self.config);
        let summary = mode == RetrievalMode::Context;
        let corpus = self.config.corpus_path();

        let mut sessions: Vec<SessionHit> = Vec::new();
        let mut chunks: Vec<ChunkHit> = Vec::new();
        // Each log file is read once per call; sessions are query-time views
        // over current file content, never stored.
        let mut file_cache: HashMap<String, Option<String>> = HashMap::new();

        for hit in hits {
            if !SessionExpander::is_dated_log(&hit.chunk.file) {
                chunks.push(hit);
                continue;
            }

            let content = file_cache
                .entry(hit.chunk.file.clone())
                .or_insert_with(|| std::fs::read_to_string(corpus.join(&hit.chunk.file)).ok());

            match content {
                Some(text) => {
                    let session = expander.expand(&hit.chunk.file, text, hit.chunk.line_start, summary);
                    sessions.push(SessionHit {
                        session,
                        score: hit.score,
                    });
                },
                None => {
                    // Log file vanished since indexing; fall back to the
                    // stored chunk rather than dropping the hit.
                    tracing::warn!(file = %hit.chunk.file, "log file unreadable, returning raw chunk");
                    chunks.push(hit);
                },
            }
        }

        Ok(SearchOutput {
            sessions: SessionExpander::dedupe(sessions),
            chunks,
        })
    }
}
