//! OpenAI-compatible chat completions backend.
//!
//! Works against any server exposing `/chat/completions` with bearer auth.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{check_status, http_client, resolve_api_key};
use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::llms::GenerationBackend;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    name: String,
    model: String,
    base_url: String,
    api_key: String,
    max_tokens: u32,
    temperature: Option<f64>,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        Ok(Self {
            name: format!("openai:{}", model),
            model,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
            max_tokens: 512,
            temperature: None,
            client: http_client(timeout)?,
        })
    }

    /// Build from configuration, reading the key from the environment.
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
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn build_request_body(&self, prompt: &str, system: &str) -> Value {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });
        if let Some(temp) = self.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }

    pub fn parse_response(response: &Value) -> Result<String, ProviderError> {
        let content = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| ProviderError::MalformedResponse("no choices[0].message.content".into()))?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ProviderError::MalformedResponse("empty completion".into()));
        }
        Ok(content.to_string())
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, ProviderError> {
        log::debug!("OpenAiBackend.generate: model={}, prompt_chars={}", self.model, prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_request_body(prompt, system))
            .send()
            .await?;

        let text = check_status(response).await?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {}", e)))?;
        Self::parse_response(&json)
    }
}
