//! Session views over dated activity logs and the retrieval mode facade types.

use super::ChunkHit;

/// A logically delimited span within a dated-log file.
///
/// Sessions are computed at query time from file content and are never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Source file path, relative to the corpus root.
    pub file: String,
    /// Session name taken from the delimiter heading text.
    pub name: String,
    /// First line of the session (the delimiter line, 1-based inclusive).
    pub line_start: usize,
    /// Last line of the session (1-based inclusive).
    pub line_end: usize,
    /// The session text (full span, or the condensed summary view).
    pub content: String,
}

/// A ranked session-level hit.
#[derive(Debug, Clone)]
pub struct SessionHit {
    /// The expanded session.
    pub session: Session,
    /// Score inherited from the best-ranked chunk hit inside the session.
    pub score: f64,
}

/// How search results should be shaped before they are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Raw chunk-level hits, no expansion.
    Chunk,
    /// Hits inside dated logs expand to their enclosing session (default).
    #[default]
    Session,
    /// Like `Session`, but sessions are condensed to high-value subsections.
    Context,
}

impl RetrievalMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Session => "session",
            Self::Context => "context",
        }
    }
}

/// Output of the retrieval facade.
///
/// Session and context modes still return chunk-level hits for files that
/// are not dated logs, so both shapes can appear in one response.
#[derive(Debug, Clone)]
pub struct SearchOutput {
    /// Session-level hits (dated logs only; empty in chunk mode).
    pub sessions: Vec<SessionHit>,
    /// Chunk-level hits (all hits in chunk mode; non-log hits otherwise).
    pub chunks: Vec<ChunkHit>,
}

impl SearchOutput {
    /// Returns true if neither shape holds any hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.chunks.is_empty()
    }
}
