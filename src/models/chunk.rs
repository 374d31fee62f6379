//! Chunk types and the per-file index registry record.

use serde::{Deserialize, Serialize};

/// A line-range slice of a source document, sized to a character budget and
/// overlapping its neighbor at boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from the chunk's identity fields.
    pub id: String,
    /// Source file path, relative to the corpus root.
    pub file: String,
    /// First source line covered (1-based, inclusive).
    pub line_start: usize,
    /// Last source line covered (1-based, inclusive).
    pub line_end: usize,
    /// The exact text of lines `line_start..=line_end`.
    pub content: String,
    /// SHA-256 of `content`, hex-encoded.
    pub content_hash: String,
    /// Position of this chunk within its file (0-based).
    pub chunk_index: usize,
}

impl Chunk {
    /// Builds the stable id from the identity tuple
    /// `(file, line_start, line_end, chunk_index)`.
    #[must_use]
    pub fn make_id(file: &str, line_start: usize, line_end: usize, chunk_index: usize) -> String {
        format!("{file}#{line_start}-{line_end}/{chunk_index}")
    }
}

/// One registry record per indexed file; the sole authority for "has this
/// file changed since the last index run".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFileRecord {
    /// Source file path, relative to the corpus root.
    pub file: String,
    /// SHA-256 of the whole file, hex-encoded.
    pub content_hash: String,
    /// Number of chunks produced on the last index run.
    pub chunk_count: usize,
    /// Unix timestamp of the last index run for this file.
    pub indexed_at: u64,
}

/// Which search pass (or passes) produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Matched only by the tokenized full-text pass.
    FullText,
    /// Matched only by the substring-containment pass.
    Substring,
    /// Matched by both passes (score boosted).
    Both,
}

impl MatchKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullText => "fts",
            Self::Substring => "substring",
            Self::Both => "both",
        }
    }
}

/// A single ranked chunk hit.
///
/// Scores are ascending-is-better (BM25-style, typically negative): a more
/// negative combined score ranks ahead of a less negative one.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Combined score after weighting and merge boosting.
    pub score: f64,
    /// Which passes matched.
    pub match_kind: MatchKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id_is_identity_derived() {
        let id = Chunk::make_id("notes/api.md", 1, 40, 0);
        assert_eq!(id, "notes/api.md#1-40/0");
    }

    #[test]
    fn test_match_kind_as_str() {
        assert_eq!(MatchKind::FullText.as_str(), "fts");
        assert_eq!(MatchKind::Both.as_str(), "both");
    }
}
