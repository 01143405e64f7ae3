//! Agent trait definition.
//!
//! Every LLM decision point (planning, analysis, integration, scoring,
//! synthesis) is an agent implementing this trait, which provides a
//! uniform call path with timeout and rate-limit retry handling.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::message::{
    CompletionRequest, CompletionResponse, ResponseSchema, TokenUsage, system_message,
    user_message,
};
use super::provider::CompletionProvider;
use super::structured::parse_json;
use crate::config::AssistantConfig;
use crate::error::ProviderError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Timeout and retry policy applied to each provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Timeout for a single attempt.
    pub timeout: Duration,
    /// Retries after a rate-limited attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per retry.
    pub retry_backoff: Duration,
}

impl CallPolicy {
    /// Builds the policy from assistant configuration.
    #[must_use]
    pub const fn from_config(config: &AssistantConfig) -> Self {
        Self {
            timeout: config.call_timeout,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&AssistantConfig::default())
    }
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a fixed system prompt and
/// model configuration. Callers use [`Agent::execute`] for free text or
/// [`execute_structured`] for a typed JSON response.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Schema for structured output; `None` requests free text.
    fn response_schema(&self) -> Option<ResponseSchema> {
        None
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        1024
    }

    /// Timeout and retry policy for this agent's calls.
    fn call_policy(&self) -> CallPolicy {
        CallPolicy::default()
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport failures or timeouts.
    async fn execute(
        &self,
        provider: &dyn CompletionProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, ProviderError> {
        let request = CompletionRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            response_schema: self.response_schema(),
        };

        let response = complete_with_policy(provider, &request, &self.call_policy()).await?;
        debug!(
            agent = self.name(),
            tokens = response.usage.total_tokens,
            finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
            "agent call complete"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

/// Executes an agent and parses its response as `T`.
///
/// # Errors
///
/// Returns [`ProviderError::Malformed`] when the response does not parse,
/// or any transport error from [`Agent::execute`].
pub async fn execute_structured<A, T>(
    agent: &A,
    provider: &dyn CompletionProvider,
    user_msg: &str,
) -> Result<(T, AgentResponse), ProviderError>
where
    A: Agent + ?Sized,
    T: DeserializeOwned,
{
    let response = agent.execute(provider, user_msg).await?;
    let parsed = parse_json::<T>(&response.content)?;
    Ok((parsed, response))
}

/// Sends a request with an independent timeout per attempt, retrying
/// rate-limited attempts with exponential back-off.
///
/// # Errors
///
/// Returns [`ProviderError::Timeout`] if an attempt exceeds the policy
/// timeout, or the last provider error once retries are exhausted.
pub async fn complete_with_policy(
    provider: &dyn CompletionProvider,
    request: &CompletionRequest,
    policy: &CallPolicy,
) -> Result<CompletionResponse, ProviderError> {
    let mut attempt: u32 = 0;
    let mut backoff = policy.retry_backoff;

    loop {
        let result = tokio::time::timeout(policy.timeout, provider.complete(request))
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Timeout {
                    elapsed: policy.timeout,
                })
            });

        match result {
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    provider = provider.name(),
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "retrying provider call"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            other => return other,
        }
    }
}
