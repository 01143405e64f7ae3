//! Vector index abstraction.
//!
//! The index owns embedding storage and nearest-neighbour search. The
//! research loop only needs ranked, scored chunks with stable identifiers.

use async_trait::async_trait;

use crate::core::{EvidenceChunk, MetadataFilters};
use crate::error::IndexError;

/// Similarity search over embedded chunks.
///
/// Implementations must be safe for concurrent use across sessions and
/// must order results deterministically for a given index state.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns up to `top_k` chunks scoring at least `score_threshold`,
    /// ordered by descending score. `filters` are metadata equality
    /// constraints.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the backend is unavailable or rejects
    /// the query.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
        filters: Option<&MetadataFilters>,
    ) -> Result<Vec<EvidenceChunk>, IndexError>;
}
