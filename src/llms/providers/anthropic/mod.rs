//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{check_status, http_client, resolve_api_key};
use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::llms::GenerationBackend;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    name: String,
    model: String,
    base_url: String,
    api_key: String,
    max_tokens: u32,
    temperature: Option<f64>,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        Ok(Self {
            name: format!("anthropic:{}", model),
            model,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
            max_tokens: 512,
            temperature: None,
            client: http_client(timeout)?,
        })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let mut backend = Self::new(
            settings.model.clone(),
            resolve_api_key(settings)?,
            settings.base_url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )?;
        backend.max_tokens = settings.max_tokens;
        backend.temperature = settings.temperature;
        Ok(backend)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// System instructions go in the top-level `system` field, not in
    /// `messages`.
    pub fn build_request_body(&self, prompt: &str, system: &str) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if !system.is_empty() {
            body["system"] = Value::String(system.to_string());
        }
        if let Some(temp) = self.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }

    /// Concatenate the `text` blocks of a response.
    pub fn parse_response(response: &Value) -> Result<String, ProviderError> {
        let content = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::MalformedResponse("no content array".into()))?;

        let text: Vec<&str> = content
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();
        let joined = text.join("").trim().to_string();
        if joined.is_empty() {
            return Err(ProviderError::MalformedResponse("no text blocks".into()));
        }
        Ok(joined)
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        log::debug!("AnthropicBackend.generate: model={}, prompt_chars={}", self.model, prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_request_body(prompt, system))
            .send()
            .await?;

        let text = check_status(response).await?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {}", e)))?;
        Self::parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_is_top_level() {
        let b = AnthropicBackend::new("claude-test", "key", None, Duration::from_secs(5)).unwrap();
        let body = b.build_request_body("hello", "be brief");
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(b.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let response = serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "It sounds "},
                {"type": "text", "text": "heavy."}
            ]
        });
        assert_eq!(AnthropicBackend::parse_response(&response).unwrap(), "It sounds heavy.");
    }

    #[test]
    fn test_parse_response_without_text_is_malformed() {
        let response = serde_json::json!({"content": [{"type": "tool_use"}]});
        assert!(matches!(
            AnthropicBackend::parse_response(&response),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
