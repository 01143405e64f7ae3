//! Provider registry and factory.
//!
//! Maps provider names to concrete [`CompletionProvider`] implementations.

use crate::agent::provider::CompletionProvider;
use crate::config::AssistantConfig;
use crate::error::ConfigError;

/// Creates a [`CompletionProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default, `openai` feature): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedProvider`] for unknown provider names
/// and [`ConfigError::ApiKeyMissing`] when the provider needs a key.
pub fn create_provider(config: &AssistantConfig) -> Result<Box<dyn CompletionProvider>, ConfigError> {
    match config.provider.as_str() {
        #[cfg(feature = "openai")]
        "openai" => Ok(Box::new(crate::agent::providers::OpenAiProvider::new(
            config,
        )?)),
        other => Err(ConfigError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
