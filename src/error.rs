//! Error types for the research assistant.
//!
//! Errors are split by collaborator: the completion provider, the vector
//! index, the research loop, configuration, and the assistant boundary.
//! Provider errors raised at decision points never escape those call
//! sites; every one of them has a documented fallback value.

use std::time::Duration;

use thiserror::Error;

/// Failures from a [`CompletionProvider`](crate::agent::CompletionProvider) call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the request because of rate limiting.
    #[error("rate limited by provider: {message}")]
    RateLimited {
        /// Provider-supplied detail.
        message: String,
    },

    /// The call did not complete within its timeout.
    #[error("provider call timed out after {elapsed:?}")]
    Timeout {
        /// Timeout that elapsed.
        elapsed: Duration,
    },

    /// A structured response was requested but could not be parsed.
    #[error("malformed provider response: {message}")]
    Malformed {
        /// Parse diagnostic.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// The provider could not be reached or returned a hard failure.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Failure detail.
        message: String,
    },
}

impl ProviderError {
    /// Returns `true` if the error should be retried with back-off.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Failures from a [`VectorIndex`](crate::index::VectorIndex) search.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index backend is unreachable.
    #[error("vector index unavailable: {message}")]
    Unavailable {
        /// Failure detail.
        message: String,
    },

    /// The search did not complete within its timeout.
    #[error("vector search timed out after {elapsed:?}")]
    Timeout {
        /// Timeout that elapsed.
        elapsed: Duration,
    },

    /// The index rejected the query.
    #[error("vector search failed: {message}")]
    Query {
        /// Failure detail.
        message: String,
    },
}

/// Failures surfaced by [`RetrievalLoop::research`](crate::research::RetrievalLoop::research).
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The query was empty or whitespace.
    #[error("query cannot be empty")]
    EmptyQuery,

    /// The query exceeds the accepted length.
    #[error("query exceeds maximum length ({len} bytes, max {max})")]
    QueryTooLong {
        /// Query length in bytes.
        len: usize,
        /// Accepted maximum.
        max: usize,
    },

    /// The initial search failed; nothing was retrieved.
    #[error("retrieval failed: {source}")]
    RetrievalFailure {
        /// Underlying index error.
        #[from]
        source: IndexError,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key was configured for a provider that needs one.
    #[error("API key missing: set OPENAI_API_KEY or RAG_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration for `{field}`: {message}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Failures of one conversational turn.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Research could not start or its initial search failed.
    #[error(transparent)]
    Research(#[from] ResearchError),

    /// Answer synthesis failed; there is no fallback answer.
    #[error("answer synthesis failed: {0}")]
    Synthesis(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_only_rate_limited() {
        assert!(
            ProviderError::RateLimited {
                message: "429".to_string()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Timeout {
                elapsed: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Unavailable {
                message: "down".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_retrieval_failure_from_index_error() {
        let err: ResearchError = IndexError::Unavailable {
            message: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, ResearchError::RetrievalFailure { .. }));
        assert!(err.to_string().contains("connection refused"));
    }
}
