//! Text generation backends and the provider fallback chain.
//!
//! - [`GenerationBackend`] - the single capability every backend exposes
//! - [`providers`] - OpenAI-compatible, Anthropic and local echo backends
//! - [`chain`] - prioritized fallback across backends, ending in local echo

pub mod chain;
pub mod providers;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use chain::{ChainEntry, ChainOutput, GenerationRequest, ProviderChain, ServedBy};
pub use providers::anthropic::AnthropicBackend;
pub use providers::local_echo::LocalEchoBackend;
pub use providers::openai::OpenAiBackend;

/// Position of a backend in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Primary,
    Secondary,
    LocalEcho,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::LocalEcho => "local_echo",
        })
    }
}

/// A generative text backend.
///
/// Each call is all-or-nothing: it either returns the full text or an error,
/// and leaves no state behind either way.
#[async_trait]
pub trait GenerationBackend: Send + Sync + fmt::Debug {
    /// Short identifier used in logs and audit records.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, ProviderError>;
}
