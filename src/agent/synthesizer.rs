//! Response synthesizer agent.
//!
//! Formats retained evidence and an importance-sized window of
//! conversation history into one generation request. Provider failures
//! propagate: there is no fallback answer.

use async_trait::async_trait;
use tracing::debug;

use super::message::ChatMessage;
use super::prompt::build_synthesis_prompt;
use super::provider::CompletionProvider;
use super::traits::{Agent, AgentResponse, CallPolicy};
use crate::config::AssistantConfig;
use crate::core::{ConversationHistory, EvidenceChunk};
use crate::error::ProviderError;

/// Agent that writes the final answer.
pub struct ResponseSynthesizer {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl ResponseSynthesizer {
    /// Creates a new synthesizer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.synthesis_model.clone(),
            max_tokens: config.synthesis_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Answers `query` from `evidence`, including the history window
    /// selected by `importance`.
    ///
    /// # Errors
    ///
    /// Returns any [`ProviderError`] from the completion call.
    pub async fn synthesize(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        evidence: &[EvidenceChunk],
        history: &ConversationHistory,
        importance: u8,
    ) -> Result<AgentResponse, ProviderError> {
        let window = history.window_for_importance(importance);
        debug!(
            importance,
            history_messages = window.len(),
            evidence = evidence.len(),
            "synthesizing answer"
        );
        let user_msg = build_synthesis_prompt(query, evidence, window, None);
        self.execute(provider, &user_msg).await
    }

    /// Rewrites `previous` to address evaluator `issues`.
    ///
    /// # Errors
    ///
    /// Returns any [`ProviderError`] from the completion call.
    pub async fn revise(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        evidence: &[EvidenceChunk],
        window: &[ChatMessage],
        previous: &str,
        issues: &[String],
    ) -> Result<AgentResponse, ProviderError> {
        let user_msg = build_synthesis_prompt(query, evidence, window, Some((previous, issues)));
        self.execute(provider, &user_msg).await
    }
}

#[async_trait]
impl Agent for ResponseSynthesizer {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}
