//! # rag-research
//!
//! Iterative retrieval and conversation-scoped knowledge management for
//! retrieval-augmented question answering.
//!
//! Nearly every decision point (search parameters, evidence sufficiency,
//! follow-up queries, context integration, relevance, answer quality) is a
//! call against a language model. Each call site has a typed response and
//! a documented fallback, so a malformed or failed completion degrades the
//! answer instead of aborting it.
//!
//! ## Components
//!
//! - [`RetrievalLoop`]: multi-round search with deduplication against the
//!   seen set and three stop signals (sufficient, no follow-ups, no new
//!   evidence) bounded by an iteration cap.
//! - [`KnowledgeContext`]: per-conversation retained evidence, merged per
//!   turn, scored for relevance with smoothing, and pruned to a token
//!   budget.
//! - [`ResponseSynthesizer`](agent::ResponseSynthesizer): answers from
//!   evidence plus an importance-sized history window.
//! - [`Assistant`]: wires the above into conversational turns.
//!
//! External collaborators are traits: [`CompletionProvider`],
//! [`VectorIndex`], [`ResourceGovernor`] and [`TokenCounter`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rag_research::{Assistant, AssistantConfig, VectorIndex, create_provider};
//!
//! # async fn run(index: Arc<dyn VectorIndex>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AssistantConfig::from_env()?;
//! let provider = Arc::from(create_provider(&config)?);
//! let assistant = Assistant::new(provider, index, config);
//!
//! let answer = assistant.ask("conversation-1", "What is the refund window?").await?;
//! println!("{}", answer.response);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod assistant;
pub mod config;
pub mod core;
pub mod error;
pub mod governor;
pub mod index;
pub mod knowledge;
pub mod research;
pub mod tokens;

pub use agent::{CompletionProvider, PromptSet, create_provider};
pub use assistant::{Answer, AskOptions, Assistant};
pub use config::AssistantConfig;
pub use crate::core::{
    ChunkId, ConversationHistory, EvidenceChunk, MetadataFilters, ResultAnalysis,
    SearchParameters, history_window,
};
pub use error::{AssistantError, ConfigError, IndexError, ProviderError, ResearchError};
pub use governor::{CallRateGovernor, ResourceGovernor, ThrottleDecision};
pub use index::VectorIndex;
pub use knowledge::{KnowledgeContext, KnowledgeContextState, MergeOutcome, MergeStrategy};
pub use research::{ResearchResult, RetrievalLoop, StopReason};
pub use tokens::{SegmentTokenCounter, TokenCounter};
