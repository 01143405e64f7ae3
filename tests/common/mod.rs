//! Scripted collaborators for integration tests.
//!
//! [`ScriptedProvider`] routes each request by its response schema name
//! (one per agent) to a queue of canned replies. [`ScriptedIndex`] serves
//! canned result sets per query and records every search.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rag_research::agent::message::{CompletionRequest, CompletionResponse, TokenUsage};
use rag_research::core::chunk::META_DOCUMENT;
use rag_research::governor::CallRateGovernor;
use rag_research::{
    AssistantConfig, CompletionProvider, EvidenceChunk, IndexError, MetadataFilters, PromptSet,
    ProviderError, RetrievalLoop, VectorIndex,
};

/// Route for the parameter planner.
pub const PLANNER: &str = "search_parameters";
/// Route for the search adjuster.
pub const ADJUSTER: &str = "search_adjustment";
/// Route for the evidence analyst.
pub const ANALYST: &str = "result_analysis";
/// Route for the context integrator.
pub const INTEGRATOR: &str = "integration_decision";
/// Route for the relevance judge.
pub const RELEVANCE: &str = "relevance_scores";
/// Route for the importance judge.
pub const IMPORTANCE: &str = "importance";
/// Route for the follow-up detector.
pub const FOLLOW_UP: &str = "follow_up";
/// Route for the answer evaluator.
pub const EVALUATOR: &str = "answer_evaluation";
/// Route for free-text synthesis.
pub const SYNTHESIS: &str = "text";

/// A canned provider reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful completion with this content.
    Text(String),
    /// Hard provider failure.
    Unavailable,
}

/// Provider answering from per-route scripts.
#[derive(Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    defaults: Mutex<HashMap<&'static str, Reply>>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl ScriptedProvider {
    /// Provider with neutral defaults: planner and analyst output
    /// garbage (so their fallbacks apply), judges answer sensibly, and
    /// synthesis returns a fixed answer.
    pub fn new() -> Arc<Self> {
        let provider = Self::default();
        provider.set_default(PLANNER, "no plan");
        provider.set_default(ADJUSTER, "{}");
        provider.set_default(ANALYST, "not json at all");
        provider.set_default(INTEGRATOR, "not json");
        provider.set_default(RELEVANCE, "not json");
        provider.set_default(IMPORTANCE, r#"{"importance": 5}"#);
        provider.set_default(FOLLOW_UP, r#"{"is_follow_up": true}"#);
        provider.set_default(EVALUATOR, r#"{"score": 0.9, "issues": [], "needs_revision": false}"#);
        provider.set_default(SYNTHESIS, "Synthesized answer.");
        Arc::new(provider)
    }

    /// Replaces the reply used when a route's queue is empty.
    pub fn set_default(&self, route: &'static str, content: &str) {
        self.defaults
            .lock()
            .unwrap()
            .insert(route, Reply::Text(content.to_string()));
    }

    /// Makes a route fail whenever its queue is empty.
    pub fn fail_by_default(&self, route: &'static str) {
        self.defaults.lock().unwrap().insert(route, Reply::Unavailable);
    }

    /// Queues a reply for a route.
    pub fn push(&self, route: &'static str, content: &str) {
        self.queues
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back(Reply::Text(content.to_string()));
    }

    /// Number of requests a route received.
    pub fn calls(&self, route: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == route)
            .count()
    }

    /// User messages sent on a route, in order.
    pub fn requests(&self, route: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == route)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    fn route_of(request: &CompletionRequest) -> &'static str {
        match request.response_schema.as_ref().map(|s| s.name.as_str()) {
            Some(PLANNER) => PLANNER,
            Some(ADJUSTER) => ADJUSTER,
            Some(ANALYST) => ANALYST,
            Some(INTEGRATOR) => INTEGRATOR,
            Some(RELEVANCE) => RELEVANCE,
            Some(IMPORTANCE) => IMPORTANCE,
            Some(FOLLOW_UP) => FOLLOW_UP,
            Some(EVALUATOR) => EVALUATOR,
            Some(other) => panic!("unexpected schema {other}"),
            None => SYNTHESIS,
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let route = Self::route_of(request);
        let user_msg = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.calls.lock().unwrap().push((route, user_msg));

        let reply = self
            .queues
            .lock()
            .unwrap()
            .get_mut(route)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.defaults.lock().unwrap().get(route).cloned())
            .unwrap_or(Reply::Unavailable);

        match reply {
            Reply::Text(content) => Ok(CompletionResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
                finish_reason: Some("stop".to_string()),
            }),
            Reply::Unavailable => Err(ProviderError::Unavailable {
                message: format!("{route} unavailable"),
            }),
        }
    }
}

/// One recorded index search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    /// Query text.
    pub query: String,
    /// Requested result count.
    pub top_k: usize,
    /// Requested score threshold.
    pub threshold: f32,
    /// Requested filters.
    pub filters: Option<MetadataFilters>,
}

#[derive(Debug, Clone)]
enum IndexReply {
    Chunks(Vec<EvidenceChunk>),
    Fail,
    Hang,
}

/// Index answering from per-query scripts. Unscripted queries return
/// no results.
#[derive(Default)]
pub struct ScriptedIndex {
    replies: Mutex<HashMap<String, VecDeque<IndexReply>>>,
    searches: Mutex<Vec<SearchCall>>,
}

impl ScriptedIndex {
    /// Empty index.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enqueue(&self, query: &str, reply: IndexReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(query.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queues a result set for `query`.
    pub fn on(&self, query: &str, chunks: Vec<EvidenceChunk>) {
        self.enqueue(query, IndexReply::Chunks(chunks));
    }

    /// Queues a failure for `query`.
    pub fn fail(&self, query: &str) {
        self.enqueue(query, IndexReply::Fail);
    }

    /// Queues a search for `query` that never completes.
    pub fn hang(&self, query: &str) {
        self.enqueue(query, IndexReply::Hang);
    }

    /// Every search made, in order.
    pub fn searches(&self) -> Vec<SearchCall> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
        filters: Option<&MetadataFilters>,
    ) -> Result<Vec<EvidenceChunk>, IndexError> {
        self.searches.lock().unwrap().push(SearchCall {
            query: query.to_string(),
            top_k,
            threshold: score_threshold,
            filters: filters.cloned(),
        });

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(query)
            .and_then(VecDeque::pop_front);

        match reply {
            None => Ok(Vec::new()),
            Some(IndexReply::Chunks(chunks)) => Ok(chunks),
            Some(IndexReply::Fail) => Err(IndexError::Unavailable {
                message: "index offline".to_string(),
            }),
            Some(IndexReply::Hang) => std::future::pending().await,
        }
    }
}

/// Evidence chunk with a document name.
pub fn chunk(id: &str, score: f32) -> EvidenceChunk {
    EvidenceChunk::new(id, format!("Evidence text for {id}."), score)
        .with_metadata(META_DOCUMENT, "handbook.md")
}

/// Analyst JSON with the given score and follow-ups.
pub fn analysis_json(score: f32, follow_ups: &[&str]) -> String {
    serde_json::json!({
        "sufficiency_score": score,
        "key_findings": [format!("finding at {score}")],
        "information_gaps": ["more detail"],
        "follow_up_queries": follow_ups,
        "irrelevant_indices": [],
    })
    .to_string()
}

/// Configuration with short timeouts and no retry back-off.
pub fn test_config() -> AssistantConfig {
    AssistantConfig::builder()
        .api_key("test")
        .call_timeout(Duration::from_secs(2))
        .search_timeout(Duration::from_millis(200))
        .max_retries(0)
        .retry_backoff(Duration::from_millis(1))
        .adjust_parameters(false)
        .build()
        .unwrap()
}

/// Retrieval loop over scripted collaborators.
pub fn retrieval_loop(
    config: &AssistantConfig,
    provider: &Arc<ScriptedProvider>,
    index: &Arc<ScriptedIndex>,
) -> RetrievalLoop {
    RetrievalLoop::new(
        config,
        &PromptSet::defaults(),
        Arc::clone(provider) as Arc<dyn CompletionProvider>,
        Arc::clone(index) as Arc<dyn VectorIndex>,
        Arc::new(CallRateGovernor::new()),
    )
}
