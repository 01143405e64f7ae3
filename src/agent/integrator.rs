//! Context integrator agent.
//!
//! For follow-up turns, decides which retained evidence to keep and which
//! newly retrieved evidence to add. The decision is applied literally by
//! the knowledge context, so it may drop existing evidence.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::message::ResponseSchema;
use super::prompt::build_integration_prompt;
use super::provider::CompletionProvider;
use super::traits::{Agent, CallPolicy, execute_structured};
use crate::config::AssistantConfig;
use crate::core::EvidenceChunk;

/// Indices of existing and new evidence to retain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IntegrationDecision {
    /// Positions in the existing evidence listing to keep.
    #[serde(default)]
    pub keep_existing: Vec<usize>,
    /// Positions in the new evidence listing to add.
    #[serde(default)]
    pub add_new: Vec<usize>,
}

/// Agent that integrates new evidence into an existing context.
pub struct ContextIntegrator {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl ContextIntegrator {
    /// Creates a new integrator with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.decision_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Requests an integration decision.
    ///
    /// Returns `None` when the call fails or its output does not parse;
    /// the caller then falls back to the union of both sets.
    pub async fn decide(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        existing: &[EvidenceChunk],
        new: &[EvidenceChunk],
    ) -> Option<IntegrationDecision> {
        let user_msg = build_integration_prompt(query, existing, new);
        match execute_structured::<_, IntegrationDecision>(self, provider, &user_msg).await {
            Ok((decision, _)) => Some(decision),
            Err(e) => {
                warn!(error = %e, "context integration failed, falling back to union");
                None
            }
        }
    }
}

#[async_trait]
impl Agent for ContextIntegrator {
    fn name(&self) -> &'static str {
        "integrator"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<IntegrationDecision>(
            "integration_decision",
        ))
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_defaults_missing_lists() {
        let decision: IntegrationDecision =
            serde_json::from_str(r#"{"add_new": [0, 2]}"#).unwrap_or_default();
        assert!(decision.keep_existing.is_empty());
        assert_eq!(decision.add_new, vec![0, 2]);
    }
}
