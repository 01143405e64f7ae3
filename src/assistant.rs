//! Conversation-level orchestration.
//!
//! Wires the retrieval loop, the knowledge context, and answer synthesis
//! into a single turn:
//!
//! ```text
//! ask(session, query)
//!   ├── FollowUpDetector (same topic as the last turn?)
//!   ├── RetrievalLoop::research → ResearchResult
//!   ├── KnowledgeContext::merge (replace / integrate / union, then prune)
//!   ├── KnowledgeContext::get_relevant (top chunks for this query)
//!   ├── ImportanceJudge → history window
//!   └── ResponseSynthesizer (+ AnswerEvaluator, one revision) → Answer
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::conversation::{FollowUpDetector, ImportanceJudge};
use crate::agent::evaluator::AnswerEvaluator;
use crate::agent::prompt::PromptSet;
use crate::agent::provider::CompletionProvider;
use crate::agent::synthesizer::ResponseSynthesizer;
use crate::config::AssistantConfig;
use crate::core::{ConversationHistory, EvidenceChunk, SearchParameters};
use crate::error::AssistantError;
use crate::governor::{CallGuard, CallRateGovernor, ResourceGovernor};
use crate::index::VectorIndex;
use crate::knowledge::{KnowledgeContext, MergeOutcome};
use crate::research::{ResearchResult, RetrievalLoop};

/// Per-turn options.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Explicit search parameters; skips parameter planning.
    pub search_parameters: Option<SearchParameters>,
    /// Evidence chunks handed to synthesis; defaults to
    /// [`AssistantConfig::max_context_chunks`].
    pub max_context_chunks: Option<usize>,
    /// Cancels research at the next iteration boundary.
    pub cancel: Option<CancellationToken>,
}

/// Result of one conversational turn.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Conversation session identifier.
    pub session_id: String,
    /// Synthesized answer text.
    pub response: String,
    /// The research behind this turn.
    pub research: ResearchResult,
    /// Evidence passed to synthesis, most relevant first.
    pub evidence: Vec<EvidenceChunk>,
    /// How the knowledge context was updated.
    pub merge: MergeOutcome,
    /// Whether the turn was treated as a follow-up.
    pub is_follow_up: bool,
    /// Conversation importance used to size the history window.
    pub importance: u8,
    /// Whether the answer was revised after self-evaluation.
    pub revised: bool,
    /// Tokens used by synthesis calls.
    pub synthesis_tokens: u32,
    /// Wall-clock duration of the turn.
    pub elapsed: Duration,
}

type SharedHistory = Arc<Mutex<ConversationHistory>>;

/// Research assistant over a vector index.
pub struct Assistant {
    provider: Arc<dyn CompletionProvider>,
    governor: Arc<dyn ResourceGovernor>,
    config: AssistantConfig,
    retrieval: RetrievalLoop,
    knowledge: KnowledgeContext,
    follow_up: FollowUpDetector,
    importance: ImportanceJudge,
    synthesizer: ResponseSynthesizer,
    evaluator: Option<AnswerEvaluator>,
    histories: Mutex<HashMap<String, SharedHistory>>,
}

impl Assistant {
    /// Creates an assistant, loading prompts from
    /// [`AssistantConfig::prompt_dir`] and throttling with a
    /// [`CallRateGovernor`].
    #[must_use]
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndex>,
        config: AssistantConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_components(
            provider,
            index,
            Arc::new(CallRateGovernor::new()),
            &prompts,
            config,
        )
    }

    /// Creates an assistant from explicit components.
    #[must_use]
    pub fn with_components(
        provider: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndex>,
        governor: Arc<dyn ResourceGovernor>,
        prompts: &PromptSet,
        config: AssistantConfig,
    ) -> Self {
        let retrieval = RetrievalLoop::new(
            &config,
            prompts,
            Arc::clone(&provider),
            index,
            Arc::clone(&governor),
        );
        let knowledge = KnowledgeContext::new(
            &config,
            prompts,
            Arc::clone(&provider),
            Arc::clone(&governor),
        );
        Self {
            follow_up: FollowUpDetector::new(&config, prompts.follow_up.clone()),
            importance: ImportanceJudge::new(&config, prompts.importance.clone()),
            synthesizer: ResponseSynthesizer::new(&config, prompts.synthesizer.clone()),
            evaluator: config
                .self_evaluate
                .then(|| AnswerEvaluator::new(&config, prompts.evaluator.clone())),
            provider,
            governor,
            config,
            retrieval,
            knowledge,
            histories: Mutex::new(HashMap::new()),
        }
    }

    /// The retrieval loop, for research without a conversation.
    #[must_use]
    pub const fn retrieval(&self) -> &RetrievalLoop {
        &self.retrieval
    }

    /// The knowledge context store.
    #[must_use]
    pub const fn knowledge(&self) -> &KnowledgeContext {
        &self.knowledge
    }

    /// Answers `query` within conversation `session_id`.
    ///
    /// # Errors
    ///
    /// See [`ask_with`](Self::ask_with).
    pub async fn ask(&self, session_id: &str, query: &str) -> Result<Answer, AssistantError> {
        self.ask_with(session_id, query, AskOptions::default()).await
    }

    /// Answers `query` with per-turn options.
    ///
    /// Turns of one conversation are serialised. A partial research result
    /// is still synthesized.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Research`] for invalid queries or a
    /// failed initial search, and [`AssistantError::Synthesis`] when the
    /// answer cannot be generated.
    pub async fn ask_with(
        &self,
        session_id: &str,
        query: &str,
        options: AskOptions,
    ) -> Result<Answer, AssistantError> {
        let start = Instant::now();
        let history = self.history_handle(session_id).await;
        let mut history = history.lock().await;

        let is_follow_up = {
            let _guard = CallGuard::new(self.governor.as_ref());
            self.follow_up
                .detect(self.provider.as_ref(), query, history.messages())
                .await
        };

        let cancel = options.cancel.unwrap_or_default();
        let research = self
            .retrieval
            .research_with_cancel(query, Some(&*history), options.search_parameters, &cancel)
            .await?;

        let merge = self
            .knowledge
            .merge(session_id, research.chunks.clone(), query, is_follow_up)
            .await;

        let max_chunks = options
            .max_context_chunks
            .unwrap_or(self.config.max_context_chunks);
        let evidence = self
            .knowledge
            .get_relevant(session_id, query, max_chunks)
            .await;

        let importance = {
            let _guard = CallGuard::new(self.governor.as_ref());
            self.importance
                .rate(self.provider.as_ref(), query, history.messages())
                .await
        };

        let first = {
            let _guard = CallGuard::new(self.governor.as_ref());
            self.synthesizer
                .synthesize(self.provider.as_ref(), query, &evidence, &history, importance)
                .await?
        };
        let mut synthesis_tokens = first.usage.total_tokens;
        let mut response = first.content;
        let mut revised = false;

        if let Some(ref evaluator) = self.evaluator {
            let evaluation = {
                let _guard = CallGuard::new(self.governor.as_ref());
                evaluator
                    .evaluate(self.provider.as_ref(), query, &response, &evidence)
                    .await
            };
            if let Some(evaluation) = evaluation.filter(|e| e.wants_revision()) {
                let window = history.window_for_importance(importance);
                let _guard = CallGuard::new(self.governor.as_ref());
                match self
                    .synthesizer
                    .revise(
                        self.provider.as_ref(),
                        query,
                        &evidence,
                        window,
                        &response,
                        &evaluation.issues,
                    )
                    .await
                {
                    Ok(revision) => {
                        synthesis_tokens =
                            synthesis_tokens.saturating_add(revision.usage.total_tokens);
                        response = revision.content;
                        revised = true;
                    }
                    Err(e) => warn!(session_id, error = %e, "revision failed, keeping first answer"),
                }
            }
        }

        history.push_user(query);
        history.push_assistant(&response);

        info!(
            session_id,
            iterations = research.iterations,
            stop_reason = %research.stop_reason,
            evidence = evidence.len(),
            is_follow_up,
            importance,
            revised,
            "turn complete"
        );

        Ok(Answer {
            session_id: session_id.to_string(),
            response,
            research,
            evidence,
            merge,
            is_follow_up,
            importance,
            revised,
            synthesis_tokens,
            elapsed: start.elapsed(),
        })
    }

    /// Copy of a conversation's history.
    pub async fn history(&self, session_id: &str) -> Option<ConversationHistory> {
        let handle = self.histories.lock().await.get(session_id).cloned()?;
        let history = handle.lock().await;
        Some(history.clone())
    }

    /// Drops a conversation's history and knowledge context.
    /// Returns `true` if either existed.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let had_history = self.histories.lock().await.remove(session_id).is_some();
        let had_context = self.knowledge.end_session(session_id).await;
        had_history || had_context
    }

    async fn history_handle(&self, session_id: &str) -> SharedHistory {
        let mut histories = self.histories.lock().await;
        Arc::clone(histories.entry(session_id.to_string()).or_default())
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
