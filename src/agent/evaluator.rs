//! Answer evaluator agent.
//!
//! Optional self-evaluation pass. When the evaluator flags concrete
//! issues the assistant requests a single revision.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::message::ResponseSchema;
use super::prompt::build_evaluation_prompt;
use super::provider::CompletionProvider;
use super::traits::{Agent, CallPolicy, execute_structured};
use crate::config::AssistantConfig;
use crate::core::EvidenceChunk;

/// Evaluator verdict on a synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerEvaluation {
    /// Overall quality in `[0, 1]`.
    pub score: f32,
    /// Concrete problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Whether a revision should be requested.
    #[serde(default)]
    pub needs_revision: bool,
}

impl AnswerEvaluation {
    /// True when a revision is warranted and there is something to fix.
    #[must_use]
    pub fn wants_revision(&self) -> bool {
        self.needs_revision && !self.issues.is_empty()
    }
}

/// Agent that reviews answers.
pub struct AnswerEvaluator {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl AnswerEvaluator {
    /// Creates a new evaluator.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.synthesis_model.clone(),
            max_tokens: config.decision_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Evaluates `answer`. Returns `None` when evaluation fails, in which
    /// case the answer is accepted as is.
    pub async fn evaluate(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        answer: &str,
        evidence: &[EvidenceChunk],
    ) -> Option<AnswerEvaluation> {
        let user_msg = build_evaluation_prompt(query, answer, evidence);
        match execute_structured::<_, AnswerEvaluation>(self, provider, &user_msg).await {
            Ok((evaluation, _)) => Some(evaluation),
            Err(e) => {
                warn!(error = %e, "answer evaluation failed, accepting answer");
                None
            }
        }
    }
}

#[async_trait]
impl Agent for AnswerEvaluator {
    fn name(&self) -> &'static str {
        "evaluator"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<AnswerEvaluation>("answer_evaluation"))
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
    fn test_revision_needs_issues() {
        let eval = AnswerEvaluation {
            score: 0.3,
            issues: Vec::new(),
            needs_revision: true,
        };
        assert!(!eval.wants_revision());
        let eval = AnswerEvaluation {
            issues: vec!["uncited claim".to_string()],
            ..eval
        };
        assert!(eval.wants_revision());
    }
}
