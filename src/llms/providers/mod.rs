//! Backend implementations.
//!
//! | Backend | Module | Wire protocol |
//! |---------|--------|---------------|
//! | OpenAI-compatible | [`openai`] | `POST {base}/chat/completions` |
//! | Anthropic | [`anthropic`] | `POST {base}/v1/messages` |
//! | Local echo | [`local_echo`] | none, never fails |

pub mod anthropic;
pub mod local_echo;
pub mod openai;

use std::time::Duration;

use crate::config::ProviderSettings;
use crate::error::ProviderError;

/// Read the API key named by `settings.api_key_env`.
pub(crate) fn resolve_api_key(settings: &ProviderSettings) -> Result<String, ProviderError> {
    std::env::var(&settings.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ProviderError::MissingApiKey(settings.api_key_env.clone()))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Transport(e.to_string()))
}

/// Map a non-success response to [`ProviderError::Http`], keeping a bounded
/// slice of the body for logs.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body: text.chars().take(500).collect(),
        });
    }
    Ok(text)
}
