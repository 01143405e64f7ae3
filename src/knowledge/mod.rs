//! Conversation-scoped knowledge context: merge, relevance, and pruning
//! of retained evidence under a token budget.

pub mod context;
pub mod state;

pub use context::{KnowledgeContext, MergeOutcome, MergeStrategy};
pub use state::KnowledgeContextState;
