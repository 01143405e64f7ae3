//! Conversation-level judges: history importance and follow-up detection.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::message::{ChatMessage, ResponseSchema};
use super::prompt::{build_follow_up_prompt, build_importance_prompt};
use super::provider::CompletionProvider;
use super::traits::{Agent, CallPolicy, execute_structured};
use crate::config::AssistantConfig;
use crate::core::history::{DEFAULT_IMPORTANCE, MAX_IMPORTANCE, MIN_IMPORTANCE};

/// History messages shown to the conversation judges.
const JUDGE_HISTORY_WINDOW: usize = 10;

/// Importance verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImportanceVerdict {
    /// How much history the question needs, 1 to 10.
    pub importance: f64,
}

/// Follow-up verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FollowUpVerdict {
    /// Whether the question continues the previous topic.
    pub is_follow_up: bool,
}

/// Agent that rates how much conversation history a question needs.
pub struct ImportanceJudge {
    model: String,
    system_prompt: String,
    policy: CallPolicy,
}

impl ImportanceJudge {
    /// Creates a new importance judge.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Rates `query` against `history`. Falls back to the middle tier.
    pub async fn rate(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        history: &[ChatMessage],
    ) -> u8 {
        if history.is_empty() {
            return MIN_IMPORTANCE;
        }
        let window = &history[history.len().saturating_sub(JUDGE_HISTORY_WINDOW)..];
        let user_msg = build_importance_prompt(query, window);
        match execute_structured::<_, ImportanceVerdict>(self, provider, &user_msg).await {
            Ok((verdict, _)) => importance_from_score(verdict.importance),
            Err(e) => {
                warn!(error = %e, "importance rating failed, using default");
                DEFAULT_IMPORTANCE
            }
        }
    }
}

/// Rounds and clamps a raw importance score; non-finite input is the default.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn importance_from_score(raw: f64) -> u8 {
    if raw.is_finite() {
        raw.round()
            .clamp(f64::from(MIN_IMPORTANCE), f64::from(MAX_IMPORTANCE)) as u8
    } else {
        DEFAULT_IMPORTANCE
    }
}

#[async_trait]
impl Agent for ImportanceJudge {
    fn name(&self) -> &'static str {
        "importance"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<ImportanceVerdict>("importance"))
    }

    fn max_tokens(&self) -> u32 {
        64
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}

/// Agent that decides whether a turn continues the previous topic.
pub struct FollowUpDetector {
    model: String,
    system_prompt: String,
    policy: CallPolicy,
}

impl FollowUpDetector {
    /// Creates a new follow-up detector.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Returns `false` for the first turn without calling the provider.
    /// On failure, assumes a follow-up so existing evidence is integrated
    /// rather than replaced.
    pub async fn detect(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        history: &[ChatMessage],
    ) -> bool {
        if history.is_empty() {
            return false;
        }
        let window = &history[history.len().saturating_sub(JUDGE_HISTORY_WINDOW)..];
        let user_msg = build_follow_up_prompt(query, window);
        match execute_structured::<_, FollowUpVerdict>(self, provider, &user_msg).await {
            Ok((verdict, _)) => verdict.is_follow_up,
            Err(e) => {
                warn!(error = %e, "follow-up detection failed, assuming follow-up");
                true
            }
        }
    }
}

#[async_trait]
impl Agent for FollowUpDetector {
    fn name(&self) -> &'static str {
        "follow_up"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<FollowUpVerdict>("follow_up"))
    }

    fn max_tokens(&self) -> u32 {
        64
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}
