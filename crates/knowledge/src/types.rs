//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// Flat metadata attached to a stored passage (`source`, `chunk_index`, `text`, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Equality predicate over metadata keys.
///
/// A record matches when every key is present with an equal value.
pub type MetadataFilter = serde_json::Map<String, serde_json::Value>;

/// Maximum characters of passage text shown in a source preview.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Characters of chunk text copied into default metadata.
pub const METADATA_TEXT_CHARS: usize = 100;

/// A text fragment prepared for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Fragment text (non-empty)
    pub text: String,

    /// Metadata stored alongside the fragment
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A stored vector with its passage text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// Unique within a collection
    pub id: String,

    /// Embedding vector
    pub vector: Vec<f32>,

    /// Passage text
    pub text: String,

    /// Passage metadata
    pub metadata: Metadata,
}

/// One hit from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,

    /// Stored passage text
    pub document: String,

    /// Cosine distance (1 - cosine similarity); smaller is closer
    pub distance: Option<f32>,

    pub metadata: Metadata,
}

/// A retrieved passage as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePassage {
    /// Passage preview, at most 200 characters plus `...`
    pub text: String,

    /// `1 - distance` clamped to `[0, 1]` and rounded to 3 decimals, 0 when
    /// the distance is unknown
    pub similarity: f32,

    pub metadata: Metadata,
}

impl SourcePassage {
    /// Build a preview from a search hit.
    pub fn from_result(result: &SearchResult) -> Self {
        let similarity = result
            .distance
            .map(|distance| round3((1.0 - distance).clamp(0.0, 1.0)))
            .unwrap_or(0.0);

        Self {
            text: truncate_chars(&result.document, SOURCE_PREVIEW_CHARS),
            similarity,
            metadata: result.metadata.clone(),
        }
    }
}

/// Bookkeeping returned with every answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub num_sources: usize,
    pub top_k: usize,
}

/// Answer to a question together with its supporting passages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Generated answer, or a diagnostic sentence
    pub answer: String,

    /// Passages in rank order
    pub sources: Vec<SourcePassage>,

    pub metadata: QueryMetadata,
}

impl QueryResult {
    /// A diagnostic answer with no sources.
    pub fn diagnostic(answer: impl Into<String>, top_k: usize) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            metadata: QueryMetadata {
                num_sources: 0,
                top_k,
            },
        }
    }
}

/// Per-query knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Passages to retrieve
    pub top_k: usize,

    /// Upper bound on answer length
    pub max_output_tokens: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_output_tokens: 500,
        }
    }
}

/// Keep the first `max_chars` characters, appending `...` when anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// First `max_chars` characters, without a marker.
pub fn prefix_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}
