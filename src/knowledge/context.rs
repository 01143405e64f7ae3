//! Per-conversation knowledge context store.
//!
//! Each session's [`KnowledgeContextState`] sits behind its own
//! [`tokio::sync::Mutex`], so two concurrent turns of one conversation
//! cannot interleave merge, scoring, and prune. Different sessions never
//! contend beyond the brief registry lookup.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::state::KnowledgeContextState;
use crate::agent::integrator::ContextIntegrator;
use crate::agent::judge::{RELEVANCE_BATCH_SIZE, RelevanceJudge};
use crate::agent::prompt::PromptSet;
use crate::agent::provider::CompletionProvider;
use crate::config::AssistantConfig;
use crate::core::{ChunkId, EvidenceChunk};
use crate::governor::{CallGuard, ResourceGovernor};
use crate::tokens::{SegmentTokenCounter, TokenCounter};

/// How a merge combined new evidence with the existing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// First update or new topic: new chunks replaced the context.
    Replaced,
    /// Follow-up: the integration decision was applied.
    Integrated,
    /// Follow-up whose integration decision failed: union of both sets.
    Union,
}

/// Summary of one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// How the sets were combined.
    pub strategy: MergeStrategy,
    /// Chunks retained after pruning.
    pub retained: usize,
    /// Chunks removed by the budget prune.
    pub pruned: usize,
}

type SessionState = Arc<Mutex<KnowledgeContextState>>;

/// Evidence retained across the turns of each conversation.
pub struct KnowledgeContext {
    provider: Arc<dyn CompletionProvider>,
    governor: Arc<dyn ResourceGovernor>,
    counter: Arc<dyn TokenCounter>,
    integrator: ContextIntegrator,
    judge: RelevanceJudge,
    token_budget: usize,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl KnowledgeContext {
    /// Creates a store using [`SegmentTokenCounter`] for token costs.
    #[must_use]
    pub fn new(
        config: &AssistantConfig,
        prompts: &PromptSet,
        provider: Arc<dyn CompletionProvider>,
        governor: Arc<dyn ResourceGovernor>,
    ) -> Self {
        Self {
            provider,
            governor,
            counter: Arc::new(SegmentTokenCounter),
            integrator: ContextIntegrator::new(config, prompts.integrator.clone()),
            judge: RelevanceJudge::new(config, prompts.relevance.clone()),
            token_budget: config.token_budget,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the token cost function.
    #[must_use]
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    async fn session(&self, session_id: &str) -> SessionState {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(KnowledgeContextState::new(
                session_id,
                self.token_budget,
            )))
        }))
    }

    async fn existing_session(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Merges newly retrieved chunks into the session's context, then
    /// prunes to the token budget.
    ///
    /// The first update of a session, or any turn that is not a
    /// follow-up, replaces the context. A follow-up applies the
    /// integrator's keep/add decision, or the union of both sets when
    /// that decision cannot be obtained.
    pub async fn merge(
        &self,
        session_id: &str,
        new_chunks: Vec<EvidenceChunk>,
        query: &str,
        is_follow_up: bool,
    ) -> MergeOutcome {
        let state = self.session(session_id).await;
        let mut state = state.lock().await;

        let strategy = if !state.has_updates() || !is_follow_up {
            state.replace(new_chunks);
            MergeStrategy::Replaced
        } else {
            let decision = {
                let _guard = CallGuard::new(self.governor.as_ref());
                self.integrator
                    .decide(
                        self.provider.as_ref(),
                        query,
                        state.retained_chunks(),
                        &new_chunks,
                    )
                    .await
            };
            if let Some(decision) = decision {
                state.integrate(&new_chunks, &decision);
                MergeStrategy::Integrated
            } else {
                state.union(new_chunks);
                MergeStrategy::Union
            }
        };

        let pruned = state.prune(self.counter.as_ref());
        debug!(
            session_id,
            strategy = ?strategy,
            retained = state.len(),
            pruned,
            "knowledge context merged"
        );

        MergeOutcome {
            strategy,
            retained: state.len(),
            pruned,
        }
    }

    /// Returns up to `max_chunks` retained chunks most relevant to `query`.
    ///
    /// When everything fits, all chunks are returned in retention order
    /// without scoring. Otherwise chunks are scored in batches of
    /// [`RELEVANCE_BATCH_SIZE`], new judgments are averaged into the
    /// stored scores, and the best `max_chunks` are returned best first.
    pub async fn get_relevant(
        &self,
        session_id: &str,
        query: &str,
        max_chunks: usize,
    ) -> Vec<EvidenceChunk> {
        let Some(state) = self.existing_session(session_id).await else {
            return Vec::new();
        };
        let mut state = state.lock().await;

        if state.len() <= max_chunks {
            return state.retained_chunks().to_vec();
        }

        let chunks = state.retained_chunks().to_vec();
        let scores = self.score_chunks(query, &chunks).await;
        if scores.is_empty() {
            warn!(session_id, "no relevance scores obtained, ranking by stored scores");
        }
        state.apply_scores(&scores);
        state.top(max_chunks)
    }

    /// Scores all chunks in fixed-size batches with bounded concurrency.
    async fn score_chunks(&self, query: &str, chunks: &[EvidenceChunk]) -> Vec<(ChunkId, f32)> {
        let concurrency = self.governor.recommend().max_concurrency.max(1);
        let batches: Vec<Vec<&EvidenceChunk>> = chunks
            .chunks(RELEVANCE_BATCH_SIZE)
            .map(|batch| batch.iter().collect())
            .collect();

        let results: Vec<Vec<(ChunkId, f32)>> = stream::iter(batches)
            .map(|batch| async move {
                let _guard = CallGuard::new(self.governor.as_ref());
                self.judge
                    .score_batch(self.provider.as_ref(), query, &batch)
                    .await
                    .into_iter()
                    .map(|(i, score)| (batch[i].chunk_id.clone(), score))
                    .collect::<Vec<_>>()
            })
            .buffered(concurrency)
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }

    /// Prunes a session to its budget; returns the number removed.
    pub async fn prune(&self, session_id: &str) -> usize {
        match self.existing_session(session_id).await {
            Some(state) => state.lock().await.prune(self.counter.as_ref()),
            None => 0,
        }
    }

    /// Copy of a session's current state.
    pub async fn snapshot(&self, session_id: &str) -> Option<KnowledgeContextState> {
        let state = self.existing_session(session_id).await?;
        let state = state.lock().await;
        Some(state.clone())
    }

    /// Discards a session's context. Returns `true` if it existed.
    pub async fn end_session(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
