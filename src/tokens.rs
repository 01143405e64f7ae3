//! Token cost estimation for the knowledge-context budget.

use unicode_segmentation::UnicodeSegmentation;

use crate::core::EvidenceChunk;

/// Counts model-tokenizer units in text.
///
/// The knowledge context only needs a consistent cost function; plug in a
/// real tokenizer where exact budgets matter.
pub trait TokenCounter: Send + Sync {
    /// Returns the token cost of `text`.
    fn count(&self, text: &str) -> usize;

    /// Returns the token cost of one evidence chunk.
    fn chunk_cost(&self, chunk: &EvidenceChunk) -> usize {
        self.count(&chunk.text)
    }
}

/// Approximates tokens as non-whitespace Unicode word-boundary segments.
///
/// Words, numbers and each punctuation mark count as one token. This
/// tracks BPE tokenizers closely enough for budgeting English prose.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentTokenCounter;

impl TokenCounter for SegmentTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_word_bounds()
            .filter(|segment| !segment.trim().is_empty())
            .count()
    }
}
