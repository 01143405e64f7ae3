//! Parsing of structured (JSON) agent responses.
//!
//! Models wrap JSON in markdown fences or surround it with prose often
//! enough that a strict `serde_json::from_str` is not sufficient.

use serde::de::DeserializeOwned;

use crate::error::ProviderError;

/// Maximum number of bytes of raw content quoted in a parse diagnostic.
const PREVIEW_LEN: usize = 200;

/// Strips markdown code fences and surrounding prose from a JSON payload.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    if trimmed.starts_with("```") {
        return trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    // Prose around a single object: take the outermost braces.
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parses an agent response into `T`.
///
/// # Errors
///
/// Returns [`ProviderError::Malformed`] when no valid `T` can be read.
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, ProviderError> {
    let json_str = extract_json(content);

    serde_json::from_str::<T>(json_str).map_err(|e| {
        let preview: String = json_str.chars().take(PREVIEW_LEN).collect();
        ProviderError::Malformed {
            message: format!(
                "{e}. Response length: {} bytes, preview: {preview:?}",
                json_str.len()
            ),
            content: content.to_string(),
        }
    })
}
