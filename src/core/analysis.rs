//! Sufficiency analysis of accumulated evidence.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sufficiency score used by the fallback analysis.
pub const FALLBACK_SUFFICIENCY: f32 = 0.5;

/// LLM-derived judgment of whether the current evidence answers the query.
///
/// A fresh analysis is produced every iteration and supersedes the
/// previous one; analyses are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultAnalysis {
    /// How well the evidence answers the query, in `[0, 1]`.
    pub sufficiency_score: f32,
    /// Facts established by the evidence.
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// What is still missing.
    #[serde(default)]
    pub information_gaps: Vec<String>,
    /// Reformulated queries targeting the gaps, in priority order.
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
    /// Positions (in the evidence listing) of chunks judged irrelevant.
    #[serde(default)]
    pub irrelevant_indices: Vec<usize>,
}

impl ResultAnalysis {
    /// The fixed analysis substituted for malformed or failed analysis calls.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            sufficiency_score: FALLBACK_SUFFICIENCY,
            key_findings: Vec::new(),
            information_gaps: Vec::new(),
            follow_up_queries: Vec::new(),
            irrelevant_indices: Vec::new(),
        }
    }
}

impl Default for ResultAnalysis {
    fn default() -> Self {
        Self::fallback()
    }
}
