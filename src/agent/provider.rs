//! Pluggable completion provider trait.
//!
//! Implementations translate provider-agnostic [`CompletionRequest`]/
//! [`CompletionResponse`] into provider-specific SDK calls. This keeps all
//! research logic decoupled from any particular LLM vendor.

use async_trait::async_trait;

use super::message::{CompletionRequest, CompletionResponse};
use crate::error::ProviderError;

/// Trait for LLM completion backends.
///
/// Implementations handle the transport layer for a specific provider
/// and must be safe for concurrent invocation across sessions.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a completion request.
    ///
    /// When `request.response_schema` is set the provider should ask the
    /// model for JSON conforming to it; parsing is done by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RateLimited`] or
    /// [`ProviderError::Unavailable`] on transport failures.
    async fn complete(&self, request: &CompletionRequest)
    -> Result<CompletionResponse, ProviderError>;
}
