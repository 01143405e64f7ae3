//! Evidence analyst agent.
//!
//! Judges whether the accumulated evidence answers the query and proposes
//! follow-up queries for the gaps. Output is sanitised before the
//! retrieval loop sees it; a failed or unparsable call yields
//! [`ResultAnalysis::fallback`].

use async_trait::async_trait;
use tracing::warn;

use super::message::{ChatMessage, ResponseSchema};
use super::prompt::build_analysis_prompt;
use super::provider::CompletionProvider;
use super::traits::{Agent, CallPolicy, execute_structured};
use crate::config::AssistantConfig;
use crate::core::{EvidenceChunk, ResultAnalysis, clamp_unit};

/// Maximum follow-up queries kept from one analysis.
pub const MAX_FOLLOW_UPS: usize = 5;

/// Maximum byte length of any finding, gap or follow-up string.
const MAX_TEXT_LEN: usize = 2_000;

/// Maximum findings or gaps kept from one analysis.
const MAX_LIST_LEN: usize = 20;

/// Agent that analyses evidence sufficiency.
pub struct EvidenceAnalyst {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    policy: CallPolicy,
}

impl EvidenceAnalyst {
    /// Creates a new analyst with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.decision_max_tokens,
            system_prompt,
            policy: CallPolicy::from_config(config),
        }
    }

    /// Analyses `chunks` against `query`. Never fails.
    pub async fn analyze(
        &self,
        provider: &dyn CompletionProvider,
        query: &str,
        chunks: &[EvidenceChunk],
        history: &[ChatMessage],
    ) -> ResultAnalysis {
        let user_msg = build_analysis_prompt(query, chunks, history);
        match execute_structured::<_, ResultAnalysis>(self, provider, &user_msg).await {
            Ok((analysis, _)) => sanitize_analysis(analysis, chunks.len()),
            Err(e) => {
                warn!(error = %e, "evidence analysis failed, using fallback analysis");
                ResultAnalysis::fallback()
            }
        }
    }
}

/// Clamps the score, tidies text lists, and drops out-of-range indices.
///
/// Follow-up queries are trimmed, emptied entries removed, duplicates
/// (case-insensitive) collapsed keeping the first, and the list capped at
/// [`MAX_FOLLOW_UPS`].
#[must_use]
pub fn sanitize_analysis(mut analysis: ResultAnalysis, evidence_len: usize) -> ResultAnalysis {
    analysis.sufficiency_score = clamp_unit(analysis.sufficiency_score);

    tidy_list(&mut analysis.key_findings, MAX_LIST_LEN);
    tidy_list(&mut analysis.information_gaps, MAX_LIST_LEN);
    tidy_list(&mut analysis.follow_up_queries, MAX_FOLLOW_UPS);

    analysis.irrelevant_indices.retain(|&i| i < evidence_len);
    analysis.irrelevant_indices.sort_unstable();
    analysis.irrelevant_indices.dedup();
    analysis
}

fn tidy_list(items: &mut Vec<String>, cap: usize) {
    let mut seen = std::collections::HashSet::new();
    let mut tidy = Vec::with_capacity(items.len().min(cap));
    for item in items.drain(..) {
        let mut text = item.trim().to_string();
        if text.is_empty() || !seen.insert(text.to_lowercase()) {
            continue;
        }
        if text.len() > MAX_TEXT_LEN {
            let mut end = MAX_TEXT_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        tidy.push(text);
        if tidy.len() == cap {
            break;
        }
    }
    *items = tidy;
}

#[async_trait]
impl Agent for EvidenceAnalyst {
    fn name(&self) -> &'static str {
        "analyst"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(ResponseSchema::for_type::<ResultAnalysis>("result_analysis"))
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn call_policy(&self) -> CallPolicy {
        self.policy
    }
}
