//! Iterative retrieval control loop.
//!
//! Coordinates one research session: plan parameters, search, analyse,
//! then search follow-up queries until one of the stop signals fires.
//! Follow-up queries within an iteration run sequentially in the order
//! the analysis returned them, and each result set is filtered against
//! the session's seen ids before it is appended.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{NoteKind, ResearchResult, ResearchSession, StopReason};
use crate::agent::analyst::EvidenceAnalyst;
use crate::agent::message::ChatMessage;
use crate::agent::planner::{ParameterPlanner, SearchAdjuster};
use crate::agent::prompt::PromptSet;
use crate::agent::provider::CompletionProvider;
use crate::config::AssistantConfig;
use crate::core::{ConversationHistory, EvidenceChunk, SearchParameters};
use crate::error::{IndexError, ResearchError};
use crate::governor::{CallGuard, ResourceGovernor};
use crate::index::VectorIndex;

/// Maximum accepted query length in bytes.
pub const MAX_QUERY_LEN: usize = 10_000;

/// Conversation messages passed to planning and analysis.
const CONTEXT_MESSAGES: usize = 6;

/// Multi-round retrieval over a [`VectorIndex`].
///
/// Holds no per-session state; one instance serves concurrent sessions.
pub struct RetrievalLoop {
    provider: Arc<dyn CompletionProvider>,
    index: Arc<dyn VectorIndex>,
    governor: Arc<dyn ResourceGovernor>,
    planner: ParameterPlanner,
    adjuster: Option<SearchAdjuster>,
    analyst: EvidenceAnalyst,
    search_timeout: Duration,
}

impl RetrievalLoop {
    /// Creates a retrieval loop.
    ///
    /// The search adjuster is only built when
    /// [`AssistantConfig::adjust_parameters`] is set.
    #[must_use]
    pub fn new(
        config: &AssistantConfig,
        prompts: &PromptSet,
        provider: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndex>,
        governor: Arc<dyn ResourceGovernor>,
    ) -> Self {
        Self {
            provider,
            index,
            governor,
            planner: ParameterPlanner::new(config, prompts.planner.clone()),
            adjuster: config
                .adjust_parameters
                .then(|| SearchAdjuster::new(config, prompts.adjuster.clone())),
            analyst: EvidenceAnalyst::new(config, prompts.analyst.clone()),
            search_timeout: config.search_timeout,
        }
    }

    /// Researches `query` to completion.
    ///
    /// When `initial_params` is `None`, parameters are planned from the
    /// query and conversation; explicit parameters are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::EmptyQuery`] or
    /// [`ResearchError::QueryTooLong`] for invalid input, and
    /// [`ResearchError::RetrievalFailure`] when the initial search fails.
    /// Later search failures end the session with a partial result.
    pub async fn research(
        &self,
        query: &str,
        context: Option<&ConversationHistory>,
        initial_params: Option<SearchParameters>,
    ) -> Result<ResearchResult, ResearchError> {
        self.research_with_cancel(query, context, initial_params, &CancellationToken::new())
            .await
    }

    /// Like [`research`](Self::research), but stops at the next iteration
    /// boundary once `cancel` fires, returning what was accumulated.
    ///
    /// # Errors
    ///
    /// See [`research`](Self::research).
    pub async fn research_with_cancel(
        &self,
        query: &str,
        context: Option<&ConversationHistory>,
        initial_params: Option<SearchParameters>,
        cancel: &CancellationToken,
    ) -> Result<ResearchResult, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::EmptyQuery);
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(ResearchError::QueryTooLong {
                len: query.len(),
                max: MAX_QUERY_LEN,
            });
        }

        let history: &[ChatMessage] = context
            .map(|h| h.recent(CONTEXT_MESSAGES))
            .unwrap_or_default();

        // Step 1: resolve parameters
        let (params, planned) = match initial_params {
            Some(params) => (params.clamped(), false),
            None => {
                let _guard = CallGuard::new(self.governor.as_ref());
                (
                    self.planner.plan(self.provider.as_ref(), query, history).await,
                    true,
                )
            }
        };
        let mut session = ResearchSession::new(query, params);
        session.note(
            NoteKind::Parameters,
            format!(
                "{} parameters: top_k={}, threshold={:.2}, max_iterations={}, sufficiency={:.2}",
                if planned { "planned" } else { "explicit" },
                session.parameters().top_k,
                session.parameters().similarity_threshold,
                session.parameters().max_iterations,
                session.parameters().sufficiency_threshold,
            ),
        );

        // Step 2: initial search; failure here is fatal
        let initial = self.search(query, session.parameters()).await?;
        let added = session.absorb(initial);
        session.note(NoteKind::Search, format!("initial search: {added} chunks"));
        debug!(
            session_id = %session.session_id(),
            chunks = added,
            "initial search complete"
        );

        // Step 3: first analysis
        session.begin_iteration();
        self.analyze(&mut session, history).await;

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let (score, follow_ups, gaps) = match session.latest_analysis() {
                Some(a) => (
                    a.sufficiency_score,
                    a.follow_up_queries.clone(),
                    a.information_gaps.clone(),
                ),
                None => break StopReason::NoFollowUps,
            };
            let params = session.parameters();
            if score >= params.sufficiency_threshold {
                break StopReason::Sufficient;
            }
            if follow_ups.is_empty() {
                break StopReason::NoFollowUps;
            }
            if session.iteration_count() >= params.max_iterations {
                break StopReason::IterationCap;
            }

            session.begin_iteration();
            let mut new_chunks = 0usize;
            let mut failure = None;

            for follow_up in &follow_ups {
                let delay = self.governor.recommend().delay;
                if !delay.is_zero() {
                    debug!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "throttling follow-up search"
                    );
                    tokio::time::sleep(delay).await;
                }

                if let Some(ref adjuster) = self.adjuster {
                    let adjusted = {
                        let _guard = CallGuard::new(self.governor.as_ref());
                        adjuster
                            .adjust(
                                self.provider.as_ref(),
                                query,
                                follow_up,
                                session.parameters(),
                                &gaps,
                            )
                            .await
                    };
                    if &adjusted != session.parameters() {
                        session.note(
                            NoteKind::Parameters,
                            format!(
                                "adjusted for {follow_up:?}: top_k={}, threshold={:.2}",
                                adjusted.top_k, adjusted.similarity_threshold
                            ),
                        );
                        session.set_parameters(adjusted);
                    }
                }

                match self.search(follow_up, session.parameters()).await {
                    Ok(chunks) => {
                        let returned = chunks.len();
                        let added = session.absorb(chunks);
                        new_chunks += added;
                        session.note(
                            NoteKind::Search,
                            format!("follow-up {follow_up:?}: {returned} returned, {added} new"),
                        );
                    }
                    Err(e) => {
                        warn!(
                            session_id = %session.session_id(),
                            follow_up,
                            error = %e,
                            "follow-up search failed, returning partial result"
                        );
                        failure = Some(e);
                        break;
                    }
                }
            }

            if let Some(e) = failure {
                break StopReason::SearchFailed {
                    message: e.to_string(),
                };
            }

            debug!(
                session_id = %session.session_id(),
                iteration = session.iteration_count(),
                new_chunks,
                total = session.accumulated_chunks().len(),
                "follow-up round complete"
            );

            if new_chunks == 0 {
                break StopReason::Exhausted;
            }

            self.analyze(&mut session, history).await;
        };

        info!(
            session_id = %session.session_id(),
            iterations = session.iteration_count(),
            chunks = session.accumulated_chunks().len(),
            stop_reason = %stop_reason,
            "research complete"
        );

        Ok(session.conclude(stop_reason))
    }

    /// Analyses the full accumulated set and records the result.
    async fn analyze(&self, session: &mut ResearchSession, history: &[ChatMessage]) {
        let analysis = {
            let _guard = CallGuard::new(self.governor.as_ref());
            self.analyst
                .analyze(
                    self.provider.as_ref(),
                    session.original_query(),
                    session.accumulated_chunks(),
                    history,
                )
                .await
        };
        session.note(
            NoteKind::Analysis,
            format!(
                "sufficiency={:.2}, {} findings, {} gaps, {} follow-ups",
                analysis.sufficiency_score,
                analysis.key_findings.len(),
                analysis.information_gaps.len(),
                analysis.follow_up_queries.len()
            ),
        );
        session.record_analysis(analysis);
    }

    /// Runs one index search under the search timeout.
    async fn search(
        &self,
        query: &str,
        params: &SearchParameters,
    ) -> Result<Vec<EvidenceChunk>, IndexError> {
        let _guard = CallGuard::new(self.governor.as_ref());
        tokio::time::timeout(
            self.search_timeout,
            self.index.search(
                query,
                params.top_k,
                params.similarity_threshold,
                params.metadata_filters.as_ref(),
            ),
        )
        .await
        .unwrap_or_else(|_| {
            Err(IndexError::Timeout {
                elapsed: self.search_timeout,
            })
        })
    }
}
