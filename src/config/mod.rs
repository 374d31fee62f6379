//! Configuration management.
//!
//! All tunables that the engine components depend on (base directory, chunk
//! sizing, stop words, the domain trigger table, the phrase allow-list) live
//! in [`MnemoConfig`] and are passed explicitly into each component. Nothing
//! reads the process environment at query time, so tests can run entirely
//! against fixtures.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default chunk size in characters (~400 tokens at 4 chars/token).
pub const DEFAULT_CHUNK_SIZE: usize = 1600;

/// Default chunk overlap in characters (~80 tokens).
pub const DEFAULT_CHUNK_OVERLAP: usize = 320;

/// Stop words dropped during keyword extraction.
const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "have", "has", "are", "was", "were",
    "will", "would", "should", "could", "can", "not", "but", "all", "any", "each", "when", "then",
    "than", "them", "they", "their", "there", "here", "what", "which", "who", "how", "why", "use",
    "using", "used", "into", "onto", "about", "after", "before", "over", "under", "also", "just",
    "only", "some", "such", "very", "you", "your", "our", "its", "it's", "get", "set", "new",
    "please", "need", "want", "make", "made", "like",
];

/// Two-word phrases kept as single keywords during extraction.
///
/// Treated as configuration data rather than fixed logic: the built-in table
/// covers the common cases and the config file can extend it.
const DEFAULT_PHRASES: &[&str] = &[
    "phone number",
    "api key",
    "webhook endpoint",
    "rate limit",
    "pull request",
    "knowledge base",
    "payment link",
    "access token",
];

/// Subsection titles extracted in the session summary view.
const DEFAULT_SUMMARY_SECTIONS: &[&str] = &["tasks", "decisions", "insights", "goal", "verdict"];

/// Ordered domain classification table: `(domain, trigger substrings)`.
///
/// Order matters: ties in trigger hit counts resolve to the earlier entry.
pub(crate) fn default_domain_table() -> Vec<(String, Vec<String>)> {
    let table: &[(&str, &[&str])] = &[
        (
            "payments",
            &["stripe", "payment", "invoice", "checkout", "refund", "subscription", "billing"],
        ),
        (
            "communication",
            &["email", "sms", "twilio", "slack", "message", "notify", "call", "vapi", "voice"],
        ),
        (
            "calendar",
            &["calendar", "schedule", "event", "meeting", "appointment", "booking"],
        ),
        (
            "data",
            &["database", "query", "record", "spreadsheet", "sheet", "airtable", "table", "csv"],
        ),
        (
            "devops",
            &["deploy", "docker", "server", "domain", "dns", "hosting", "cloudflare", "build"],
        ),
        (
            "content",
            &["blog", "post", "article", "seo", "publish", "social", "video", "image"],
        ),
        (
            "crm",
            &["lead", "contact", "customer", "deal", "pipeline", "hubspot", "crm"],
        ),
    ];
    table
        .iter()
        .map(|(domain, triggers)| {
            (
                (*domain).to_string(),
                triggers.iter().map(|t| (*t).to_string()).collect(),
            )
        })
        .collect()
}

/// Main configuration for mnemo.
#[derive(Debug, Clone)]
pub struct MnemoConfig {
    /// Base directory holding the corpus and the store.
    pub base_dir: PathBuf,
    /// Directory of markdown source files, relative to `base_dir`.
    pub corpus_dir: PathBuf,
    /// Store filename inside `base_dir`.
    pub db_file: String,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap window carried between adjacent chunks, in characters.
    pub chunk_overlap: usize,
    /// Maximum results returned when the caller gives no limit.
    pub default_limit: usize,
    /// Stop words dropped during keyword extraction.
    pub stop_words: HashSet<String>,
    /// Meaningful two-word phrases kept whole during extraction.
    pub phrases: Vec<String>,
    /// Ordered domain -> trigger-substring table.
    pub domain_table: Vec<(String, Vec<String>)>,
    /// Subsection titles included in the session summary view.
    pub summary_sections: Vec<String>,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".mnemo"),
            corpus_dir: PathBuf::from("memory"),
            db_file: "index.db".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            default_limit: 10,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| (*w).to_string()).collect(),
            phrases: DEFAULT_PHRASES.iter().map(|p| (*p).to_string()).collect(),
            domain_table: default_domain_table(),
            summary_sections: DEFAULT_SUMMARY_SECTIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Base directory.
    pub base_dir: Option<String>,
    /// Corpus directory (relative to base).
    pub corpus_dir: Option<String>,
    /// Store filename.
    pub db_file: Option<String>,
    /// Chunk size in characters.
    pub chunk_size: Option<usize>,
    /// Chunk overlap in characters.
    pub chunk_overlap: Option<usize>,
    /// Default result limit.
    pub default_limit: Option<usize>,
    /// Extra stop words (merged with the built-in set).
    pub extra_stop_words: Option<Vec<String>>,
    /// Extra phrases (merged with the built-in allow-list).
    pub extra_phrases: Option<Vec<String>>,
}

impl MnemoConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute path to the embedded store file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.base_dir.join(&self.db_file)
    }

    /// Absolute path to the corpus directory.
    #[must_use]
    pub fn corpus_path(&self) -> PathBuf {
        self.base_dir.join(&self.corpus_dir)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| crate::Error::InvalidInput(format!("config parse error: {e}")))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/mnemo/config.toml` on
    /// Linux) and falls back to defaults when no file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let config_path = base_dirs.config_dir().join("mnemo").join("config.toml");
        if config_path.exists() {
            if let Ok(config) = Self::load_from_file(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `MnemoConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(base_dir) = file.base_dir {
            config.base_dir = PathBuf::from(base_dir);
        }
        if let Some(corpus_dir) = file.corpus_dir {
            config.corpus_dir = PathBuf::from(corpus_dir);
        }
        if let Some(db_file) = file.db_file {
            config.db_file = db_file;
        }
        if let Some(chunk_size) = file.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = file.chunk_overlap {
            config.chunk_overlap = chunk_overlap;
        }
        if let Some(default_limit) = file.default_limit {
            config.default_limit = default_limit;
        }
        if let Some(words) = file.extra_stop_words {
            config.stop_words.extend(words);
        }
        if let Some(phrases) = file.extra_phrases {
            config.phrases.extend(phrases);
        }

        config
    }

    /// Sets the base directory.
    #[must_use]
    pub fn with_base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = path.into();
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the chunk overlap.
    #[must_use]
    pub const fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    /// Returns true if `word` is a stop word.
    #[must_use]
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}
