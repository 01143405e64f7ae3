//! Search planning agents.
//!
//! [`ParameterPlanner`] derives the parameter set for a research session
//! from the query and recent conversation. [`SearchAdjuster`] retunes the
//! per-search fields for each follow-up query. Both fall back instead of
//! failing: a planner error yields [`SearchParameters::default`], an
//! adjuster error keeps the current parameters.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::message::{ChatMessage, ResponseSchema};
use super::prompt::{build_adjust_prompt, build_planner_prompt};
use super::provider::CompletionProvider;
use super::traits::{Agent, CallPolicy, execute_structured};
use crate::config::AssistantConfig;
use crate::core::{ParameterOverrides, SearchAdjustment, SearchParameters};

/// Agent that chooses search parameters for a query.
pub struct ParameterPlanner {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl ParameterPlanner {
    /// Creates a new planner with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.decision_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Plans parameters for `query`. Never fails.
    ///
    /// The model's proposal is applied over the fallback set and clamped,
    /// so missing or out-of-range fields are repaired field by field.
    pub async fn plan(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        history: &[ChatMessage],
    ) -> SearchParameters {
        let user_msg = build_planner_prompt(query, history);
        match execute_structured::<_, ParameterOverrides>(self, provider, &user_msg).await {
            Ok((overrides, _)) => {
                let params = SearchParameters::default().with_overrides(&overrides);
                debug!(
                    top_k = params.top_k,
                    similarity_threshold = params.similarity_threshold,
                    max_iterations = params.max_iterations,
                    sufficiency_threshold = params.sufficiency_threshold,
                    "planned search parameters"
                );
                params
            }
            Err(e) => {
                warn!(error = %e, "parameter planning failed, using fallback parameters");
                SearchParameters::default()
            }
        }
    }
}

#[async_trait]
impl Agent for ParameterPlanner {
    fn name(&self) -> &'static str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<ParameterOverrides>(
            "search_parameters",
        ))
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}

/// Agent that retunes search parameters for one follow-up query.
pub struct SearchAdjuster {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl SearchAdjuster {
    /// Creates a new adjuster with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.decision_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Returns parameters for searching `follow_up`. Never fails.
    pub async fn adjust(
        &self,
        provider: &dyn CompletionProvider,
        original_query: &str,
        follow_up: &str,
        current: &SearchParameters,
        gaps: &[String],
    ) -> SearchParameters {
        let user_msg = build_adjust_prompt(original_query, follow_up, current, gaps);
        match execute_structured::<_, SearchAdjustment>(self, provider, &user_msg).await {
            Ok((adjustment, _)) => current.with_adjustment(&adjustment),
            Err(e) => {
                warn!(error = %e, follow_up, "search adjustment failed, keeping parameters");
                current.clone()
            }
        }
    }
}

#[async_trait]
impl Agent for SearchAdjuster {
    fn name(&self) -> &'static str {
        "adjuster"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<SearchAdjustment>(
            "search_adjustment",
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
    use crate::agent::message::{CompletionRequest, CompletionResponse, TokenUsage};
    use crate::agent::prompt::{ADJUSTER_SYSTEM_PROMPT, PLANNER_SYSTEM_PROMPT};
    use crate::error::ProviderError;

    /// Provider that answers every request with a fixed string.
    struct FixedProvider(&'static str);

    #[async_trait]
    impl CompletionProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                usage: TokenUsage::default(),
                finish_reason: None,
            })
        }
    }

    fn planner() -> ParameterPlanner {
        ParameterPlanner::new(&AssistantConfig::default(), PLANNER_SYSTEM_PROMPT.to_string())
    }

    #[tokio::test]
    async fn test_plan_clamps_out_of_range() {
        let provider = FixedProvider(
            r#"{"top_k": 500, "similarity_threshold": 0.2, "max_iterations": 9, "sufficiency_threshold": 0.6}"#,
        );
        let params = planner().plan(&provider, "q", &[]).await;
        assert_eq!(params.top_k, 50);
        assert!((params.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(params.max_iterations, 5);
        assert!((params.sufficiency_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_plan_partial_response_keeps_fallback_fields() {
        let provider = FixedProvider(r#"{"top_k": 20}"#);
        let params = planner().plan(&provider, "q", &[]).await;
        assert_eq!(params.top_k, 20);
        assert_eq!(params.max_iterations, 3);
    }

    #[tokio::test]
    async fn test_plan_garbage_falls_back() {
        let provider = FixedProvider("I'd search broadly.");
        let params = planner().plan(&provider, "q", &[]).await;
        assert_eq!(params, SearchParameters::default());
    }

    #[tokio::test]
    async fn test_adjust_changes_only_search_fields() {
        let provider = FixedProvider(
            r#"{"top_k": 5, "similarity_threshold": 0.9, "metadata_filters": {"doc_type": "faq"}}"#,
        );
        let adjuster =
            SearchAdjuster::new(&AssistantConfig::default(), ADJUSTER_SYSTEM_PROMPT.to_string());
        let current = SearchParameters::default();
        let adjusted = adjuster.adjust(&provider, "q", "fq", &current, &[]).await;
        assert_eq!(adjusted.top_k, 5);
        assert!((adjusted.similarity_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(adjusted.max_iterations, current.max_iterations);
        assert_eq!(
            adjusted
                .metadata_filters
                .as_ref()
                .and_then(|f| f.get("doc_type"))
                .map(String::as_str),
            Some("faq")
        );
    }

    #[tokio::test]
    async fn test_adjust_failure_keeps_current() {
        let provider = FixedProvider("nope");
        let adjuster =
            SearchAdjuster::new(&AssistantConfig::default(), ADJUSTER_SYSTEM_PROMPT.to_string());
        let current = SearchParameters {
            top_k: 7,
            ..SearchParameters::default()
        };
        let adjusted = adjuster.adjust(&provider, "q", "fq", &current, &[]).await;
        assert_eq!(adjusted, current);
    }
}
