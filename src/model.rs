use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored or ephemeral unit of source material.
///
/// `content` is always canonical plain text, whatever the source encoding
/// was. `id` 0 means the document was never persisted to the catalog
/// (ephemeral analysis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    /// Declared filename at upload time
    pub name: String,
    /// Format-family tag: text, tabular, spreadsheet, data, markup,
    /// richtext or image
    pub category: String,
    pub description: Option<String>,
    pub content: String,
    pub size_bytes: usize,
    /// SHA-256 hex digest of the raw payload, for duplicate detection
    pub fingerprint: String,
    /// Raw bytes kept for image-modality documents; not exposed to renderers
    #[serde(skip)]
    pub preview: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// The result of one generative round trip against a document.
///
/// Immutable once stored; exactly one per analysis invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: u64,
    pub document_id: u64,
    /// The caller's query, or the default prompt label
    pub query: String,
    pub analysis: String,
    pub insights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A single actionable item extracted from an analysis reply.
///
/// `bookmarked` is the only field ever mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub id: u64,
    pub title: String,
    pub content: String,
    /// Always populated; inherits the source document's category with a
    /// "general" fallback
    pub category: String,
    /// Derived from the matched category marker in the reply
    pub subcategory: Option<String>,
    /// Provenance string, e.g. `"Erosion Control Plan, Section 2"`
    pub citation: Option<String>,
    pub bookmarked: bool,
    pub document_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}
