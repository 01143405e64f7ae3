//! Per-query research session state.
//!
//! A [`ResearchSession`] is owned by exactly one in-flight call to
//! [`RetrievalLoop::research`](super::RetrievalLoop::research). Its seen
//! set only grows and its accumulated chunks are append-only, so no
//! chunk id is ever counted twice as new evidence.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ChunkId, EvidenceChunk, ResultAnalysis, SearchParameters};

/// Why a research session stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The analysis reported sufficient evidence.
    Sufficient,
    /// The analysis proposed no follow-up queries.
    NoFollowUps,
    /// The iteration cap was reached.
    IterationCap,
    /// A follow-up round found no chunk that had not been seen.
    Exhausted,
    /// The caller cancelled the session at an iteration boundary.
    Cancelled,
    /// A follow-up search failed after the initial round succeeded.
    SearchFailed {
        /// Failure detail.
        message: String,
    },
}

impl StopReason {
    /// Whether the result is incomplete rather than a normal conclusion.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Cancelled | Self::SearchFailed { .. })
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sufficient => write!(f, "sufficient evidence"),
            Self::NoFollowUps => write!(f, "no follow-up queries"),
            Self::IterationCap => write!(f, "iteration cap reached"),
            Self::Exhausted => write!(f, "no new evidence found"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::SearchFailed { message } => write!(f, "search failed: {message}"),
        }
    }
}

/// Category of a research note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Parameters were planned or adjusted.
    Parameters,
    /// A search ran.
    Search,
    /// An analysis was produced.
    Analysis,
    /// The session concluded.
    Conclusion,
}

/// One entry of the append-only research log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchNote {
    /// Iteration the note belongs to (0 = before the first analysis).
    pub iteration: usize,
    /// Note category.
    pub kind: NoteKind,
    /// Free-text detail.
    pub detail: String,
}

/// State of one query's retrieval process.
#[derive(Debug, Clone)]
pub struct ResearchSession {
    session_id: Uuid,
    original_query: String,
    parameters: SearchParameters,
    seen_chunk_ids: HashSet<ChunkId>,
    accumulated_chunks: Vec<EvidenceChunk>,
    iteration_count: usize,
    latest_analysis: Option<ResultAnalysis>,
    notes: Vec<ResearchNote>,
}

impl ResearchSession {
    /// Starts a session with resolved parameters.
    #[must_use]
    pub fn new(query: &str, parameters: SearchParameters) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            original_query: query.to_string(),
            parameters,
            seen_chunk_ids: HashSet::new(),
            accumulated_chunks: Vec::new(),
            iteration_count: 0,
            latest_analysis: None,
            notes: Vec::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The query the session was started for.
    #[must_use]
    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    /// Parameters currently in effect.
    #[must_use]
    pub const fn parameters(&self) -> &SearchParameters {
        &self.parameters
    }

    /// Replaces the parameters in effect.
    pub fn set_parameters(&mut self, parameters: SearchParameters) {
        self.parameters = parameters;
    }

    /// Every chunk id retrieved so far, accumulated or not.
    #[must_use]
    pub const fn seen_chunk_ids(&self) -> &HashSet<ChunkId> {
        &self.seen_chunk_ids
    }

    /// Accumulated chunks in retrieval order.
    #[must_use]
    pub fn accumulated_chunks(&self) -> &[EvidenceChunk] {
        &self.accumulated_chunks
    }

    /// Completed analysis iterations.
    #[must_use]
    pub const fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    /// Most recent analysis, if any.
    #[must_use]
    pub const fn latest_analysis(&self) -> Option<&ResultAnalysis> {
        self.latest_analysis.as_ref()
    }

    /// The research log.
    #[must_use]
    pub fn notes(&self) -> &[ResearchNote] {
        &self.notes
    }

    /// Appends chunks whose ids have not been seen, in the given order.
    ///
    /// Duplicates within `chunks` itself are also dropped. Returns the
    /// number of chunks appended.
    pub fn absorb(&mut self, chunks: Vec<EvidenceChunk>) -> usize {
        let before = self.accumulated_chunks.len();
        for chunk in chunks {
            if self.seen_chunk_ids.insert(chunk.chunk_id.clone()) {
                self.accumulated_chunks.push(chunk);
            }
        }
        self.accumulated_chunks.len() - before
    }

    /// Records a new analysis, superseding the previous one.
    pub fn record_analysis(&mut self, analysis: ResultAnalysis) {
        self.latest_analysis = Some(analysis);
    }

    /// Advances the iteration counter.
    pub const fn begin_iteration(&mut self) {
        self.iteration_count += 1;
    }

    /// Appends a note to the research log.
    pub fn note(&mut self, kind: NoteKind, detail: impl Into<String>) {
        self.notes.push(ResearchNote {
            iteration: self.iteration_count,
            kind,
            detail: detail.into(),
        });
    }

    /// Consumes the session into its final result.
    #[must_use]
    pub fn conclude(mut self, stop_reason: StopReason) -> ResearchResult {
        self.note(NoteKind::Conclusion, stop_reason.to_string());

        let analysis = self.latest_analysis.unwrap_or_default();
        ResearchResult {
            session_id: self.session_id,
            query: self.original_query,
            chunks: self.accumulated_chunks,
            key_findings: analysis.key_findings,
            information_gaps: analysis.information_gaps,
            information_sufficiency: analysis.sufficiency_score,
            iterations: self.iteration_count,
            parameters_used: self.parameters,
            partial: stop_reason.is_partial(),
            stop_reason,
            notes: self.notes,
        }
    }
}

/// Outcome of a research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    /// Session identifier.
    pub session_id: Uuid,
    /// The researched query.
    pub query: String,
    /// All accumulated chunks, unique by id, in retrieval order.
    pub chunks: Vec<EvidenceChunk>,
    /// Findings from the last analysis.
    pub key_findings: Vec<String>,
    /// Gaps from the last analysis.
    pub information_gaps: Vec<String>,
    /// Sufficiency score from the last analysis.
    pub information_sufficiency: f32,
    /// Completed analysis iterations.
    pub iterations: usize,
    /// Parameters in effect when the session ended.
    pub parameters_used: SearchParameters,
    /// True when the session ended early (cancelled or failed search).
    pub partial: bool,
    /// Why the session stopped.
    pub stop_reason: StopReason,
    /// Research log.
    pub notes: Vec<ResearchNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str) -> EvidenceChunk {
        EvidenceChunk::new(id, format!("text of {id}"), 0.8)
    }

    #[test]
    fn test_absorb_filters_seen_ids() {
        let mut session = ResearchSession::new("q", SearchParameters::default());
        assert_eq!(session.absorb(vec![chunk("a"), chunk("b"), chunk("c")]), 3);
        assert_eq!(session.absorb(vec![chunk("b"), chunk("d")]), 1);
        assert_eq!(session.absorb(vec![chunk("a")]), 0);

        let ids: Vec<&str> = session
            .accumulated_chunks()
            .iter()
            .map(|c| c.chunk_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(session.seen_chunk_ids().len(), 4);
    }

    #[test]
    fn test_absorb_drops_duplicates_within_batch() {
        let mut session = ResearchSession::new("q", SearchParameters::default());
        assert_eq!(session.absorb(vec![chunk("a"), chunk("a")]), 1);
    }

    #[test]
    fn test_conclude_without_analysis_uses_fallback() {
        let mut session = ResearchSession::new("q", SearchParameters::default());
        session.absorb(vec![chunk("a")]);
        let result = session.conclude(StopReason::Cancelled);
        assert!(result.partial);
        assert!((result.information_sufficiency - 0.5).abs() < f32::EPSILON);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(
            result.notes.last().map(|n| n.kind),
            Some(NoteKind::Conclusion)
        );
    }

    #[test]
    fn test_partial_only_for_early_exits() {
        assert!(!StopReason::Sufficient.is_partial());
        assert!(!StopReason::NoFollowUps.is_partial());
        assert!(!StopReason::IterationCap.is_partial());
        assert!(!StopReason::Exhausted.is_partial());
        assert!(StopReason::Cancelled.is_partial());
        assert!(
            StopReason::SearchFailed {
                message: "down".to_string()
            }
            .is_partial()
        );
    }

    #[test]
    fn test_stop_reason_serialization() {
        let json = serde_json::to_string(&StopReason::IterationCap).unwrap_or_default();
        assert_eq!(json, r#"{"reason":"iteration_cap"}"#);
    }
}
