//! Provider fallback chain.
//!
//! Remote backends are tried in priority order, each under its own timeout.
//! Any failure moves on to the next backend; the local echo at the end
//! always answers, so callers always receive text.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::providers::anthropic::AnthropicBackend;
use super::providers::local_echo::{LocalEchoBackend, LOCAL_ECHO_NAME};
use super::providers::openai::OpenAiBackend;
use super::{BackendKind, GenerationBackend};
use crate::config::{MirrorConfig, ProviderKind, ProviderSettings};
use crate::error::{MirrorError, ProviderError};

/// A remote backend with its position and per-call timeout.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub kind: BackendKind,
    pub backend: Arc<dyn GenerationBackend>,
    pub timeout: Duration,
}

/// Which backend produced a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedBy {
    pub kind: BackendKind,
    pub name: String,
}

/// A backend attempt that did not produce text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub backend: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    /// What the local echo reflects if every remote backend fails.
    pub echo_source: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOutput {
    pub text: String,
    pub served_by: ServedBy,
    pub failures: Vec<BackendFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderChain {
    entries: Vec<ChainEntry>,
    echo: LocalEchoBackend,
}

impl ProviderChain {
    /// A chain with only the local echo.
    pub fn new(echo: LocalEchoBackend) -> Self {
        Self {
            entries: Vec::new(),
            echo,
        }
    }

    /// Append a remote backend. The first one added is primary.
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        let kind = if self.entries.is_empty() {
            BackendKind::Primary
        } else {
            BackendKind::Secondary
        };
        self.entries.push(ChainEntry { kind, backend, timeout });
        self
    }

    /// Build the chain from configured providers. Backends that cannot be
    /// constructed (typically a missing API key) are skipped with a warning.
    pub fn from_config(config: &MirrorConfig) -> Self {
        config.providers.iter().fold(
            Self::new(LocalEchoBackend::new(config.echo_max_chars)),
            |chain, settings| match build_backend(settings) {
                Ok(backend) => {
                    log::info!("generation backend '{}' enabled", backend.name());
                    chain.with_backend(backend, Duration::from_secs(settings.timeout_secs))
                }
                Err(e) => {
                    log::warn!("skipping {:?} backend '{}': {}", settings.kind, settings.model, e);
                    chain
                }
            },
        )
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Whether any backend besides the local echo is configured.
    pub fn has_remote(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn echo(&self) -> &LocalEchoBackend {
        &self.echo
    }

    /// Run the chain to completion. Never fails.
    pub async fn generate(&self, request: &GenerationRequest<'_>) -> ChainOutput {
        // A token nobody else holds is never cancelled.
        match self.generate_cancellable(request, &CancellationToken::new()).await {
            Ok(output) => output,
            Err(_) => self.echo_output(request, Vec::new()),
        }
    }

    /// Run the chain, abandoning the in-flight attempt if `cancel` fires.
    /// A cancelled attempt leaves nothing behind.
    pub async fn generate_cancellable(
        &self,
        request: &GenerationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ChainOutput, MirrorError> {
        let mut failures = Vec::new();
        for entry in &self.entries {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(MirrorError::Cancelled),
                r = attempt(entry, request.prompt, request.system) => r,
            };
            match outcome {
                Ok(text) => {
                    return Ok(ChainOutput {
                        text,
                        served_by: ServedBy {
                            kind: entry.kind,
                            name: entry.backend.name().to_string(),
                        },
                        failures,
                    })
                }
                Err(e) => {
                    log::warn!(
                        "{} backend '{}' failed, falling back: {}",
                        entry.kind,
                        entry.backend.name(),
                        e
                    );
                    failures.push(BackendFailure {
                        backend: entry.backend.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }
        Ok(self.echo_output(request, failures))
    }

    /// Remote backends only, for requests the echo cannot serve (strict
    /// rewrites). Fails with [`ProviderError::Unavailable`] when none is
    /// configured, or with the last backend's error.
    pub async fn generate_remote(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<(String, ServedBy), ProviderError> {
        let mut last = ProviderError::Unavailable("no remote backend configured".into());
        for entry in &self.entries {
            match attempt(entry, prompt, system).await {
                Ok(text) => {
                    let served = ServedBy {
                        kind: entry.kind,
                        name: entry.backend.name().to_string(),
                    };
                    return Ok((text, served));
                }
                Err(e) => {
                    log::warn!("rewrite via '{}' failed: {}", entry.backend.name(), e);
                    last = e;
                }
            }
        }
        Err(last)
    }

    fn echo_output(&self, request: &GenerationRequest<'_>, failures: Vec<BackendFailure>) -> ChainOutput {
        if !failures.is_empty() {
            log::warn!("all {} remote backend(s) failed; serving local echo", failures.len());
        }
        ChainOutput {
            text: self.echo.reflect(request.echo_source),
            served_by: ServedBy {
                kind: BackendKind::LocalEcho,
                name: LOCAL_ECHO_NAME.to_string(),
            },
            failures,
        }
    }
}

fn build_backend(settings: &ProviderSettings) -> Result<Arc<dyn GenerationBackend>, ProviderError> {
    Ok(match settings.kind {
        ProviderKind::Openai => Arc::new(OpenAiBackend::from_settings(settings)?),
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::from_settings(settings)?),
    })
}

/// One all-or-nothing call under the entry's timeout. Blank text counts as
/// a malformed response.
async fn attempt(entry: &ChainEntry, prompt: &str, system: &str) -> Result<String, ProviderError> {
    let text = tokio::time::timeout(entry.timeout, entry.backend.generate(prompt, system))
        .await
        .map_err(|_| ProviderError::Timeout(entry.timeout))??;
    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse("blank completion".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Instant;

    #[derive(Debug)]
    struct Failing(ProviderError);

    #[async_trait]
    impl GenerationBackend for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn generate(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            Err(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct Slow;

    #[async_trait]
    impl GenerationBackend for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn generate(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    #[derive(Debug)]
    struct Fixed(&'static str);

    #[async_trait]
    impl GenerationBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn generate(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    const REQUEST: GenerationRequest<'static> = GenerationRequest {
        system: "system",
        prompt: "prompt",
        echo_source: "I keep saying yes to everything",
    };

    #[tokio::test]
    async fn test_all_failing_falls_back_to_echo() {
        let timeout = Duration::from_millis(200);
        let chain = ProviderChain::default()
            .with_backend(Arc::new(Failing(ProviderError::Transport("down".into()))), timeout)
            .with_backend(Arc::new(Slow), timeout);

        let started = Instant::now();
        let out = chain.generate(&REQUEST).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!out.text.is_empty());
        assert!(out.text.contains("I keep saying yes"));
        assert_eq!(out.served_by.kind, BackendKind::LocalEcho);
        assert_eq!(out.failures.len(), 2);
        assert!(out.failures[1].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_secondary_serves_after_primary_fails() {
        let chain = ProviderChain::default()
            .with_backend(
                Arc::new(Failing(ProviderError::MalformedResponse("bad".into()))),
                Duration::from_secs(1),
            )
            .with_backend(Arc::new(Fixed("What feels heavy?")), Duration::from_secs(1));
        let out = chain.generate(&REQUEST).await;
        assert_eq!(out.text, "What feels heavy?");
        assert_eq!(out.served_by.kind, BackendKind::Secondary);
        assert_eq!(out.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_text_is_a_failure() {
        let chain = ProviderChain::default().with_backend(Arc::new(Fixed("  ")), Duration::from_secs(1));
        let out = chain.generate(&REQUEST).await;
        assert_eq!(out.served_by.kind, BackendKind::LocalEcho);
    }

    #[tokio::test]
    async fn test_cancelled_chain_returns_error() {
        let chain = ProviderChain::default().with_backend(Arc::new(Slow), Duration::from_secs(30));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = chain.generate_cancellable(&REQUEST, &token).await;
        assert!(matches!(result, Err(MirrorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_generate_remote_without_backends() {
        let chain = ProviderChain::default();
        assert!(!chain.has_remote());
        assert!(matches!(
            chain.generate_remote("p", "s").await,
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[test]
    fn test_from_config_skips_missing_keys() {
        let mut config = MirrorConfig::default();
        config.providers.push(ProviderSettings {
            kind: ProviderKind::Anthropic,
            model: "claude-test".into(),
            base_url: None,
            api_key_env: "MIRROR_TEST_SURELY_UNSET_ANTHROPIC_KEY".into(),
            timeout_secs: 5,
            max_tokens: 64,
            temperature: None,
        });
        assert!(!ProviderChain::from_config(&config).has_remote());
    }
}
