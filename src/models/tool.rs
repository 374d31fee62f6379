//! Tool catalog records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The provider shape a tool record was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolKind {
    /// An externally configured integration endpoint (or one of its
    /// enumerated operations).
    Integration,
    /// A reusable workflow document.
    Workflow,
}

impl ToolKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Integration => "integration",
            Self::Workflow => "workflow",
        }
    }

    /// Parses a kind string, defaulting to `Workflow` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "integration" => Self::Integration,
            _ => Self::Workflow,
        }
    }
}

/// A normalized capability descriptor used for task-to-capability matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Stable id derived from provider + name.
    pub id: String,
    /// Operation or workflow name.
    pub name: String,
    /// Record kind.
    pub kind: ToolKind,
    /// Provider name or workflow file path.
    pub source: String,
    /// Coarse domain label assigned by trigger matching.
    pub domain: String,
    /// Human-readable description.
    pub description: String,
    /// Extracted, deduplicated, lower-cased keywords.
    pub keywords: Vec<String>,
    /// Declared parameter names.
    pub parameters: Vec<String>,
    /// Usage examples.
    pub examples: Vec<String>,
    /// Static priority weight (base + kind bonus + domain bonus).
    pub priority: f64,
    /// How many times this record has been recommended.
    pub use_count: u64,
    /// Unix timestamp of the last recommendation, if any.
    pub last_used: Option<u64>,
    /// SHA-256 over the normalized shape; changes iff any externally
    /// observable field changes.
    pub content_hash: String,
}

impl ToolRecord {
    /// Builds the stable id from provider and name.
    ///
    /// Lower-cases and collapses non-alphanumeric runs to `_` so the id is
    /// safe as a primary key and stable across re-syncs.
    #[must_use]
    pub fn make_id(provider: &str, name: &str) -> String {
        let slug = |s: &str| {
            let mut out = String::with_capacity(s.len());
            let mut last_sep = true;
            for c in s.chars() {
                if c.is_ascii_alphanumeric() {
                    out.push(c.to_ascii_lowercase());
                    last_sep = false;
                } else if !last_sep {
                    out.push('_');
                    last_sep = true;
                }
            }
            out.trim_end_matches('_').to_string()
        };
        format!("{}__{}", slug(provider), slug(name))
    }

    /// Computes the change-detection hash over the normalized shape.
    ///
    /// Deliberately excludes `use_count` and `last_used`: usage learning
    /// must not force a rewrite on the next sync.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.source.as_bytes());
        hasher.update([0]);
        hasher.update(self.domain.as_bytes());
        hasher.update([0]);
        hasher.update(self.description.as_bytes());
        hasher.update([0]);
        hasher.update(self.keywords.join(",").as_bytes());
        hasher.update([0]);
        hasher.update(self.parameters.join(",").as_bytes());
        hasher.update([0]);
        hasher.update(self.examples.join("\n").as_bytes());
        hasher.update([0]);
        hasher.update(format!("{:.3}", self.priority).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A ranked capability suggestion returned by `recommend`.
#[derive(Debug, Clone)]
pub struct Recommendation {
    /// The suggested record.
    pub record: ToolRecord,
    /// Normalized confidence in `[0, 1)`.
    pub confidence: f64,
    /// Task keywords that overlapped this record's keyword set.
    pub matched_keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, description: &str) -> ToolRecord {
        ToolRecord {
            id: ToolRecord::make_id("stripe", name),
            name: name.to_string(),
            kind: ToolKind::Integration,
            source: "stripe".to_string(),
            domain: "payments".to_string(),
            description: description.to_string(),
            keywords: vec!["checkout".to_string()],
            parameters: vec![],
            examples: vec![],
            priority: 1.5,
            use_count: 0,
            last_used: None,
            content_hash: String::new(),
        }
    }

    #[test]
    fn test_make_id_is_stable_and_slugged() {
        assert_eq!(
            ToolRecord::make_id("Stripe API", "create-checkout.session"),
            "stripe_api__create_checkout_session"
        );
        assert_eq!(
            ToolRecord::make_id("stripe", "charge"),
            ToolRecord::make_id("stripe", "charge")
        );
    }

    #[test]
    fn test_hash_changes_with_observable_fields_only() {
        let base = record("checkout", "Create a checkout session");
        let same = record("checkout", "Create a checkout session");
        assert_eq!(base.compute_hash(), same.compute_hash());

        let mut changed = record("checkout", "Create a payment link");
        assert_ne!(base.compute_hash(), changed.compute_hash());

        // Usage learning must not change the hash.
        changed = record("checkout", "Create a checkout session");
        changed.use_count = 42;
        changed.last_used = Some(1_700_000_000);
        assert_eq!(base.compute_hash(), changed.compute_hash());
    }

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(ToolKind::parse("integration"), ToolKind::Integration);
        assert_eq!(ToolKind::parse("workflow"), ToolKind::Workflow);
        assert_eq!(ToolKind::parse("unknown"), ToolKind::Workflow);
    }
}
