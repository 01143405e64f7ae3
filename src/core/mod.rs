//! Core data types shared across the research loop, knowledge context
//! and synthesis: evidence chunks, search parameters, analyses, and
//! conversation history.

pub mod analysis;
pub mod chunk;
pub mod history;
pub mod params;

pub use analysis::ResultAnalysis;
pub use chunk::{ChunkId, EvidenceChunk, clamp_unit};
pub use history::{ConversationHistory, history_window};
pub use params::{MetadataFilters, ParameterOverrides, SearchAdjustment, SearchParameters};
