//! Pipeline configuration.
//!
//! A [`MirrorConfig`] is built once at process start (defaults, then an
//! optional YAML file, then environment overrides) and handed to the
//! [`Orchestrator`](crate::orchestrator::Orchestrator). Nothing in the crate
//! reads configuration from globals.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::utilities::prompts::PromptSettings;

/// Message returned verbatim when the crisis bypass fires.
pub const DEFAULT_CRISIS_MESSAGE: &str = "It sounds like you may be going through something \
really painful right now. You deserve immediate support from a person. If you are in danger \
or thinking about ending your life, please contact your local emergency number or a crisis \
line such as 988 (US) or findahelpline.com to reach someone now.";

/// Which wire protocol a remote backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `/chat/completions`-style APIs.
    Openai,
    /// Anthropic Messages API.
    Anthropic,
}

/// One remote generation backend, in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f64>,
}

fn default_timeout_secs() -> u64 { 30 }
fn default_max_tokens() -> u32 { 512 }

/// Weights for growth metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthParams {
    #[serde(default = "default_weight")]
    pub insight_weight: f64,
    #[serde(default = "default_weight")]
    pub recognition_weight: f64,
}

fn default_weight() -> f64 { 1.0 }

impl Default for GrowthParams {
    fn default() -> Self {
        Self {
            insight_weight: 1.0,
            recognition_weight: 1.0,
        }
    }
}

/// Heuristics for tension detection and status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensionParams {
    /// Opposing marker pairs needed before two labels count as in tension.
    #[serde(default = "default_opposition_threshold")]
    pub opposition_threshold: usize,
    /// Share of a label's content words that must reappear for a later
    /// reflection to count as mentioning it.
    #[serde(default = "default_softening_overlap")]
    pub softening_overlap: f64,
    #[serde(default = "default_base_strength")]
    pub base_strength: f64,
    #[serde(default = "default_pair_weight")]
    pub pair_weight: f64,
}

fn default_opposition_threshold() -> usize { 1 }
fn default_softening_overlap() -> f64 { 0.5 }
fn default_base_strength() -> f64 { 0.5 }
fn default_pair_weight() -> f64 { 0.25 }

impl Default for TensionParams {
    fn default() -> Self {
        Self {
            opposition_threshold: default_opposition_threshold(),
            softening_overlap: default_softening_overlap(),
            base_strength: default_base_strength(),
            pair_weight: default_pair_weight(),
        }
    }
}

/// Top-level configuration for the reflection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_crisis_keywords")]
    pub crisis_keywords: Vec<String>,
    #[serde(default = "default_crisis_message")]
    pub crisis_message: String,
    #[serde(default = "default_loop_threshold")]
    pub loop_similarity_threshold: f64,
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
    #[serde(default = "default_avoidance_word_limit")]
    pub avoidance_word_limit: usize,
    #[serde(default = "default_breakthrough_window")]
    pub breakthrough_window: usize,
    #[serde(default)]
    pub growth: GrowthParams,
    #[serde(default)]
    pub tension: TensionParams,
    /// Remote backends, highest priority first. The local echo is always
    /// appended after these.
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
    #[serde(default = "default_echo_max_chars")]
    pub echo_max_chars: usize,
    #[serde(default = "default_synthesis_top_n")]
    pub synthesis_top_n: usize,
    #[serde(default = "default_lint_max_retries")]
    pub lint_max_retries: u32,
    #[serde(default)]
    pub prompts: PromptSettings,
}

fn default_crisis_keywords() -> Vec<String> {
    [
        "suicide",
        "suicidal",
        "kill myself",
        "end my life",
        "want to die",
        "better off dead",
        "self harm",
        "self-harm",
        "hurt myself",
        "no reason to live",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_crisis_message() -> String { DEFAULT_CRISIS_MESSAGE.to_string() }
fn default_loop_threshold() -> f64 { 0.7 }
fn default_loop_window() -> usize { 5 }
fn default_avoidance_word_limit() -> usize { 20 }
fn default_breakthrough_window() -> usize { 3 }
fn default_echo_max_chars() -> usize { 140 }
fn default_synthesis_top_n() -> usize { 3 }
fn default_lint_max_retries() -> u32 { 1 }

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            crisis_keywords: default_crisis_keywords(),
            crisis_message: default_crisis_message(),
            loop_similarity_threshold: default_loop_threshold(),
            loop_window: default_loop_window(),
            avoidance_word_limit: default_avoidance_word_limit(),
            breakthrough_window: default_breakthrough_window(),
            growth: GrowthParams::default(),
            tension: TensionParams::default(),
            providers: Vec::new(),
            echo_max_chars: default_echo_max_chars(),
            synthesis_top_n: default_synthesis_top_n(),
            lint_max_retries: default_lint_max_retries(),
            prompts: PromptSettings::default(),
        }
    }
}

impl MirrorConfig {
    /// Parse configuration from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config YAML at {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MIRROR_*` environment overrides.
    ///
    /// - `MIRROR_LOOP_THRESHOLD`: loop similarity threshold
    /// - `MIRROR_LOOP_WINDOW`: number of past reflections compared
    /// - `MIRROR_PROVIDER_TIMEOUT_SECS`: timeout for every remote backend
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MIRROR_LOOP_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.loop_similarity_threshold = v;
        }
        if let Some(v) = lookup("MIRROR_LOOP_WINDOW").and_then(|v| v.parse().ok()) {
            self.loop_window = v;
        }
        if let Some(v) = lookup("MIRROR_PROVIDER_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            for provider in &mut self.providers {
                provider.timeout_secs = v;
            }
        }
    }

    /// Reject values the heuristics cannot work with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.loop_similarity_threshold) {
            return Err(ValidationError::new(
                "loop_similarity_threshold",
                "must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.tension.softening_overlap) {
            return Err(ValidationError::new(
                "tension.softening_overlap",
                "must be within [0, 1]",
            ));
        }
        if self.loop_window == 0 {
            return Err(ValidationError::new("loop_window", "must be at least 1"));
        }
        if self.breakthrough_window < 2 {
            return Err(ValidationError::new("breakthrough_window", "must be at least 2"));
        }
        if self.lint_max_retries > 1 {
            return Err(ValidationError::new(
                "lint_max_retries",
                "at most one strict rewrite is allowed",
            ));
        }
        if self.crisis_message.trim().is_empty() {
            return Err(ValidationError::new("crisis_message", "must not be empty"));
        }
        if let Some(p) = self.providers.iter().find(|p| p.timeout_secs == 0) {
            return Err(ValidationError::new(
                "providers.timeout_secs",
                format!("backend '{}' needs a non-zero timeout", p.model),
            ));
        }
        Ok(())
    }
}
