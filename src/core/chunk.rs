//! Evidence chunks returned by the vector index.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable chunk identifier, unique within an index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Creates a chunk identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Metadata key for the source document name.
pub const META_DOCUMENT: &str = "document";
/// Metadata key for the structural location inside the document.
pub const META_LOCATION: &str = "location";
/// Metadata key for the document type.
pub const META_DOC_TYPE: &str = "doc_type";

/// An immutable unit of retrieved content.
///
/// `score` is the similarity reported by the index for the query that
/// produced this value. It is not an intrinsic property of the chunk: a
/// different query yields a different `EvidenceChunk` via [`with_score`].
///
/// [`with_score`]: EvidenceChunk::with_score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    /// Stable identifier used for deduplication.
    pub chunk_id: ChunkId,
    /// Chunk content.
    pub text: String,
    /// Document and source attributes; opaque to the retrieval loop.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Similarity score in `[0, 1]` at retrieval time.
    pub score: f32,
}

impl EvidenceChunk {
    /// Creates a chunk with empty metadata. The score is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(chunk_id: impl Into<ChunkId>, text: impl Into<String>, score: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
            score: clamp_unit(score),
        }
    }

    /// Adds a metadata attribute.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this chunk associated with a new score.
    #[must_use]
    pub fn with_score(&self, score: f32) -> Self {
        Self {
            score: clamp_unit(score),
            ..self.clone()
        }
    }

    /// Source document name, if known.
    #[must_use]
    pub fn document(&self) -> Option<&str> {
        self.metadata.get(META_DOCUMENT).map(String::as_str)
    }

    /// Human-readable source label: `document › location`.
    #[must_use]
    pub fn source_label(&self) -> String {
        match (self.document(), self.metadata.get(META_LOCATION)) {
            (Some(doc), Some(loc)) => format!("{doc} › {loc}"),
            (Some(doc), None) => doc.to_string(),
            (None, Some(loc)) => loc.clone(),
            (None, None) => self.chunk_id.to_string(),
        }
    }
}

/// Clamps a score into `[0, 1]`, mapping NaN to `0`.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
