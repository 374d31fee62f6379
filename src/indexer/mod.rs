//! Incremental, content-addressed chunk indexing.
//!
//! The indexer derives everything from file content: a whole-file SHA-256
//! gates re-indexing (unchanged files are exact no-ops), and each chunk
//! carries its own content hash. Chunk replacement is atomic per file; a
//! failing file never aborts the rest of a batch.

use crate::config::MnemoConfig;
use crate::models::{Chunk, IndexedFileRecord};
use crate::storage::Store;
use crate::{current_timestamp, Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::instrument;
use walkdir::WalkDir;

/// Hex-encoded SHA-256 of a text blob.
pub(crate) fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Outcome of indexing one file within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// File changed (or was forced); this many chunks were written.
    Indexed(usize),
    /// Content hash matched the registry; nothing was written.
    Skipped,
    /// The file could not be indexed; the batch continued without it.
    Failed(String),
}

/// Result of an `index` run over a directory.
#[derive(Debug, Default)]
pub struct IndexSummary {
    /// Per-file outcomes in walk order.
    pub outcomes: Vec<(String, FileOutcome)>,
    /// Registry records pruned because their source file disappeared.
    pub pruned: usize,
}

impl IndexSummary {
    /// Number of files (re-)indexed.
    #[must_use]
    pub fn indexed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Indexed(_)))
            .count()
    }

    /// Number of files skipped as unchanged.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Skipped))
            .count()
    }

    /// Number of files that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Failed(_)))
            .count()
    }
}

/// Chunks source files and maintains the content-addressed chunk store.
pub struct Indexer<'a> {
    store: &'a Store,
    config: &'a MnemoConfig,
}

impl<'a> Indexer<'a> {
    /// Creates an indexer over `store` with the given configuration.
    #[must_use]
    pub const fn new(store: &'a Store, config: &'a MnemoConfig) -> Self {
        Self { store, config }
    }

    /// Indexes a single file, returning the number of chunks written.
    ///
    /// Returns 0 without touching the store when the whole-file content
    /// hash matches the registry (and `force` is not set).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the store write fails.
    #[instrument(skip(self), fields(operation = "index_file", file = rel_path))]
    pub fn index_file(&self, path: &Path, rel_path: &str, force: bool) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_source_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let content_hash = hash_content(&content);
        if !force {
            if let Some(stored) = self.store.file_hash(rel_path)? {
                if stored == content_hash {
                    tracing::debug!(file = rel_path, "unchanged, skipping");
                    return Ok(0);
                }
            }
        }

        let chunks = chunk_lines(
            rel_path,
            &content,
            self.config.chunk_size,
            self.config.chunk_overlap,
        );

        let record = IndexedFileRecord {
            file: rel_path.to_string(),
            content_hash,
            chunk_count: chunks.len(),
            indexed_at: current_timestamp(),
        };

        self.store.replace_file_chunks(&record, &chunks)?;
        Ok(chunks.len())
    }

    /// Indexes every markdown file under `dir`, file by file, sequentially.
    ///
    /// A file that vanishes mid-batch (or fails to read) is recorded as
    /// failed and the batch continues; only storage failures abort. With
    /// `force`, registry records whose source file no longer exists are
    /// pruned after the walk.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store itself fails.
    #[instrument(skip(self), fields(operation = "index_directory", dir = %dir.display(), force))]
    pub fn index_directory(&self, dir: &Path, force: bool) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();
        let mut seen: HashSet<String> = HashSet::new();

        let mut paths: Vec<_> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().is_some_and(|ext| ext == "md")
            })
            .map(walkdir::DirEntry::into_path)
            .collect();
        paths.sort();

        for path in paths {
            let rel_path = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            seen.insert(rel_path.clone());

            match self.index_file(&path, &rel_path, force) {
                Ok(0) => summary.outcomes.push((rel_path, FileOutcome::Skipped)),
                Ok(n) => summary.outcomes.push((rel_path, FileOutcome::Indexed(n))),
                Err(e @ Error::StorageUnavailable { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(file = rel_path, error = %e, "skipping failed file");
                    summary
                        .outcomes
                        .push((rel_path, FileOutcome::Failed(e.to_string())));
                },
            }
        }

        if force {
            for record in self.store.indexed_files()? {
                if !seen.contains(&record.file) {
                    self.store.remove_file(&record.file)?;
                    summary.pruned += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Splits `content` into overlapping line-range chunks.
///
/// Lines accumulate into a buffer; once the buffer exceeds `chunk_size`
/// characters it closes as a chunk, and the next buffer is seeded with the
/// trailing lines of the previous one up to `overlap` characters. The
/// overlap snaps to whole lines so every chunk's content equals the exact
/// source slice `lines[line_start..=line_end]`.
pub(crate) fn chunk_lines(
    file: &str,
    content: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    // Buffer state: (1-based line number, line text) plus running char count
    // (line length + 1 for the newline).
    let mut buffer: Vec<(usize, &str)> = Vec::new();
    let mut buffer_len = 0usize;
    // Lines added since the last emit; a buffer holding only seeded overlap
    // must not flush as a trailing chunk.
    let mut fresh_lines = 0usize;

    let mut emit = |buffer: &[(usize, &str)], chunks: &mut Vec<Chunk>| {
        let line_start = buffer[0].0;
        let line_end = buffer[buffer.len() - 1].0;
        let text: String = buffer
            .iter()
            .map(|(_, l)| *l)
            .collect::<Vec<_>>()
            .join("\n");
        let chunk_index = chunks.len();
        chunks.push(Chunk {
            id: Chunk::make_id(file, line_start, line_end, chunk_index),
            file: file.to_string(),
            line_start,
            line_end,
            content_hash: hash_content(&text),
            content: text,
            chunk_index,
        });
    };

    for (i, line) in lines.iter().enumerate() {
        buffer.push((i + 1, *line));
        buffer_len += line.len() + 1;
        fresh_lines += 1;

        if buffer_len > chunk_size {
            emit(&buffer, &mut chunks);

            // Seed the next buffer with trailing whole lines up to the
            // overlap budget.
            let mut carry: Vec<(usize, &str)> = Vec::new();
            let mut carry_len = 0usize;
            for &(n, l) in buffer.iter().rev() {
                if carry_len + l.len() + 1 > overlap {
                    break;
                }
                carry_len += l.len() + 1;
                carry.push((n, l));
            }
            carry.reverse();
            buffer = carry;
            buffer_len = carry_len;
            fresh_lines = 0;
        }
    }

    if fresh_lines > 0 && !buffer.is_empty() {
        emit(&buffer, &mut chunks);
    }

    chunks
}
