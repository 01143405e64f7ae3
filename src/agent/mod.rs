//! LLM decision agents and provider plumbing.
//!
//! Every decision point in the research pipeline is an [`Agent`] with a
//! typed response and a documented fallback, so a malformed or failed
//! completion degrades the result instead of aborting it.
//!
//! # Architecture
//!
//! ```text
//! query → ParameterPlanner (initial SearchParameters)
//!   ├── VectorIndex search
//!   ├── EvidenceAnalyst (ResultAnalysis, follow-ups)
//!   │   └── SearchAdjuster per follow-up
//!   ├── ContextIntegrator / RelevanceJudge (knowledge context)
//!   ├── ImportanceJudge / FollowUpDetector (conversation)
//!   └── ResponseSynthesizer (+ AnswerEvaluator) → answer text
//! ```
//!
//! # Feature Gate
//!
//! The bundled `OpenAI`-compatible provider requires the `openai` feature
//! (enabled by default).

pub mod analyst;
pub mod client;
pub mod conversation;
pub mod evaluator;
pub mod integrator;
pub mod judge;
pub mod message;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod structured;
pub mod synthesizer;
pub mod traits;

// Re-export key types
pub use analyst::EvidenceAnalyst;
pub use client::create_provider;
pub use conversation::{FollowUpDetector, ImportanceJudge};
pub use evaluator::{AnswerEvaluation, AnswerEvaluator};
pub use integrator::{ContextIntegrator, IntegrationDecision};
pub use judge::{RELEVANCE_BATCH_SIZE, RelevanceJudge};
pub use message::{ChatMessage, CompletionRequest, CompletionResponse, Role, TokenUsage};
pub use planner::{ParameterPlanner, SearchAdjuster};
pub use prompt::PromptSet;
pub use provider::CompletionProvider;
pub use synthesizer::ResponseSynthesizer;
pub use traits::{Agent, AgentResponse, CallPolicy, execute_structured};
