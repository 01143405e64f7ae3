//! Relevance judge agent.
//!
//! Scores a small batch of retained evidence against the live query. The
//! knowledge context averages these judgments with earlier ones.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::message::ResponseSchema;
use super::prompt::build_relevance_prompt;
use super::provider::CompletionProvider;
use super::traits::{Agent, CallPolicy, execute_structured};
use crate::config::AssistantConfig;
use crate::core::{EvidenceChunk, clamp_unit};

/// Chunks scored per relevance call.
pub const RELEVANCE_BATCH_SIZE: usize = 5;

/// One scored item in a relevance batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredItem {
    /// Position within the batch.
    pub index: usize,
    /// Relevance in `[0, 1]`.
    pub score: f32,
}

/// Relevance judgments for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelevanceScores {
    /// Per-item scores.
    #[serde(default)]
    pub scores: Vec<ScoredItem>,
}

/// Agent that scores evidence relevance.
pub struct RelevanceJudge {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl RelevanceJudge {
    /// Creates a new judge with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.decision_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Scores one batch.
    ///
    /// Returns `(batch_index, score)` pairs with scores clamped and
    /// out-of-range indices dropped. A failed call returns an empty list,
    /// leaving every score in the batch unchanged.
    pub async fn score_batch(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        batch: &[&EvidenceChunk],
    ) -> Vec<(usize, f32)> {
        let user_msg = build_relevance_prompt(query, batch);
        match execute_structured::<_, RelevanceScores>(self, provider, &user_msg).await {
            Ok((scores, _)) => scores
                .scores
                .into_iter()
                .filter(|item| item.index < batch.len())
                .map(|item| (item.index, clamp_unit(item.score)))
                .collect(),
            Err(e) => {
                warn!(error = %e, batch_len = batch.len(), "relevance scoring failed, scores unchanged");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Agent for RelevanceJudge {
    fn name(&self) -> &'static str {
        "relevance"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<RelevanceScores>("relevance_scores"))
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}
