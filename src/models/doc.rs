//! Curated long-form documentation entries.

use serde::{Deserialize, Serialize};

/// An authored reference entry, read-only at query time.
///
/// Curated docs keep verbose documentation out of the agent's working
/// context until explicitly requested via `retrieve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedDoc {
    /// Stable id derived from the tool name.
    pub id: String,
    /// Name of the tool or capability this documents.
    pub tool_name: String,
    /// One-line description.
    pub description: String,
    /// The full documentation body.
    pub full_documentation: String,
    /// Authored keywords.
    pub keywords: Vec<String>,
    /// Static priority weight.
    pub priority: f64,
}

/// A ranked curated-doc hit.
#[derive(Debug, Clone)]
pub struct DocHit {
    /// The matched doc.
    pub doc: CuratedDoc,
    /// Re-scored relevance (higher is better; read path only, no mutation).
    pub score: f64,
}
