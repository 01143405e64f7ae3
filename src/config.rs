//! Assistant configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default provider name.
const DEFAULT_PROVIDER: &str = "openai";
/// Default model for decision agents (planning, analysis, scoring).
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default model for answer synthesis.
const DEFAULT_SYNTHESIS_MODEL: &str = "gpt-4o";
/// Default max tokens for decision agents.
const DEFAULT_DECISION_MAX_TOKENS: u32 = 1024;
/// Default max tokens for synthesis.
const DEFAULT_SYNTHESIS_MAX_TOKENS: u32 = 2048;
/// Default per-call provider timeout in seconds.
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
/// Default per-search index timeout in seconds.
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
/// Default retry attempts on rate limiting.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default initial back-off between retries.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
/// Default knowledge-context token budget.
const DEFAULT_TOKEN_BUDGET: usize = 6000;
/// Default number of evidence chunks handed to synthesis.
const DEFAULT_MAX_CONTEXT_CHUNKS: usize = 8;

/// Configuration for the research assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for decision agents: planning, analysis, integration, scoring.
    pub model: String,
    /// Model for answer synthesis and evaluation.
    pub synthesis_model: String,
    /// Maximum tokens for decision agent responses.
    pub decision_max_tokens: u32,
    /// Maximum tokens for synthesized answers.
    pub synthesis_max_tokens: u32,
    /// Timeout applied to each provider call.
    pub call_timeout: Duration,
    /// Timeout applied to each vector index search.
    pub search_timeout: Duration,
    /// Maximum retry attempts when the provider rate-limits.
    pub max_retries: u32,
    /// Initial back-off between retries; doubles per attempt.
    pub retry_backoff: Duration,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
    /// Ceiling on retained knowledge-context size, in tokens.
    pub token_budget: usize,
    /// Number of evidence chunks passed to synthesis per turn.
    pub max_context_chunks: usize,
    /// Ask the model to adjust search parameters per follow-up query.
    pub adjust_parameters: bool,
    /// Self-evaluate answers and request one revision when flagged.
    pub self_evaluate: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            synthesis_model: DEFAULT_SYNTHESIS_MODEL.to_string(),
            decision_max_tokens: DEFAULT_DECISION_MAX_TOKENS,
            synthesis_max_tokens: DEFAULT_SYNTHESIS_MAX_TOKENS,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            search_timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            prompt_dir: None,
            token_budget: DEFAULT_TOKEN_BUDGET,
            max_context_chunks: DEFAULT_MAX_CONTEXT_CHUNKS,
            adjust_parameters: true,
            self_evaluate: false,
        }
    }
}

impl AssistantConfig {
    /// Creates a new builder for `AssistantConfig`.
    #[must_use]
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an environment value is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug, Clone, Default)]
pub struct AssistantConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    synthesis_model: Option<String>,
    decision_max_tokens: Option<u32>,
    synthesis_max_tokens: Option<u32>,
    call_timeout: Option<Duration>,
    search_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    token_budget: Option<usize>,
    max_context_chunks: Option<usize>,
    adjust_parameters: Option<bool>,
    self_evaluate: Option<bool>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AssistantConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RAG_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RAG_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RAG_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("RAG_MODEL").ok();
        }
        if self.synthesis_model.is_none() {
            self.synthesis_model = std::env::var("RAG_SYNTHESIS_MODEL").ok();
        }
        if self.token_budget.is_none() {
            self.token_budget = env_parse("RAG_TOKEN_BUDGET");
        }
        if self.max_context_chunks.is_none() {
            self.max_context_chunks = env_parse("RAG_MAX_CONTEXT_CHUNKS");
        }
        if self.call_timeout.is_none() {
            self.call_timeout = env_parse("RAG_CALL_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.search_timeout.is_none() {
            self.search_timeout = env_parse("RAG_SEARCH_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RAG_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the decision-agent model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the synthesis model.
    #[must_use]
    pub fn synthesis_model(mut self, model: impl Into<String>) -> Self {
        self.synthesis_model = Some(model.into());
        self
    }

    /// Sets the decision-agent max tokens.
    #[must_use]
    pub const fn decision_max_tokens(mut self, n: u32) -> Self {
        self.decision_max_tokens = Some(n);
        self
    }

    /// Sets the synthesis max tokens.
    #[must_use]
    pub const fn synthesis_max_tokens(mut self, n: u32) -> Self {
        self.synthesis_max_tokens = Some(n);
        self
    }

    /// Sets the per-call provider timeout.
    #[must_use]
    pub const fn call_timeout(mut self, duration: Duration) -> Self {
        self.call_timeout = Some(duration);
        self
    }

    /// Sets the per-search index timeout.
    #[must_use]
    pub const fn search_timeout(mut self, duration: Duration) -> Self {
        self.search_timeout = Some(duration);
        self
    }

    /// Sets the max retries on rate limiting.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the initial retry back-off.
    #[must_use]
    pub const fn retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = Some(delay);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the knowledge-context token budget.
    #[must_use]
    pub const fn token_budget(mut self, n: usize) -> Self {
        self.token_budget = Some(n);
        self
    }

    /// Sets the number of evidence chunks passed to synthesis.
    #[must_use]
    pub const fn max_context_chunks(mut self, n: usize) -> Self {
        self.max_context_chunks = Some(n);
        self
    }

    /// Enables or disables per-follow-up parameter adjustment.
    #[must_use]
    pub const fn adjust_parameters(mut self, enabled: bool) -> Self {
        self.adjust_parameters = Some(enabled);
        self
    }

    /// Enables or disables answer self-evaluation.
    #[must_use]
    pub const fn self_evaluate(mut self, enabled: bool) -> Self {
        self.self_evaluate = Some(enabled);
        self
    }

    /// Builds the [`AssistantConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero token budget, zero
    /// context chunks, or a zero timeout.
    pub fn build(self) -> Result<AssistantConfig, ConfigError> {
        let defaults = AssistantConfig::default();

        let config = AssistantConfig {
            provider: self.provider.unwrap_or(defaults.provider),
            api_key: self.api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or(defaults.model),
            synthesis_model: self.synthesis_model.unwrap_or(defaults.synthesis_model),
            decision_max_tokens: self
                .decision_max_tokens
                .unwrap_or(defaults.decision_max_tokens),
            synthesis_max_tokens: self
                .synthesis_max_tokens
                .unwrap_or(defaults.synthesis_max_tokens),
            call_timeout: self.call_timeout.unwrap_or(defaults.call_timeout),
            search_timeout: self.search_timeout.unwrap_or(defaults.search_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff: self.retry_backoff.unwrap_or(defaults.retry_backoff),
            prompt_dir: self.prompt_dir,
            token_budget: self.token_budget.unwrap_or(defaults.token_budget),
            max_context_chunks: self
                .max_context_chunks
                .unwrap_or(defaults.max_context_chunks),
            adjust_parameters: self.adjust_parameters.unwrap_or(defaults.adjust_parameters),
            self_evaluate: self.self_evaluate.unwrap_or(defaults.self_evaluate),
        };

        if config.token_budget == 0 {
            return Err(ConfigError::Invalid {
                field: "token_budget",
                message: "must be greater than zero".to_string(),
            });
        }
        if config.max_context_chunks == 0 {
            return Err(ConfigError::Invalid {
                field: "max_context_chunks",
                message: "must be greater than zero".to_string(),
            });
        }
        if config.call_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "call_timeout",
                message: "must be non-zero".to_string(),
            });
        }
        if config.search_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "search_timeout",
                message: "must be non-zero".to_string(),
            });
        }

        Ok(config)
    }
}
