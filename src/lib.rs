//! # mirrorback
//!
//! Response orchestration for reflective writing. Each submitted reflection
//! updates the writer's identity graph and pattern history, picks a tone,
//! plans and drafts a reply through a provider fallback chain, and lints the
//! draft so the reply mirrors rather than advises.

pub mod analysis;
pub mod config;
pub mod error;
pub mod evolution;
pub mod guardrails;
pub mod identity;
pub mod llms;
pub mod orchestrator;
pub mod store;
pub mod synthesis;
pub mod tone;
pub mod utilities;

pub use analysis::{AnalysisInput, Analyzer, HeuristicAnalyzer};
pub use config::MirrorConfig;
pub use error::{MirrorError, ProviderError, ValidationError};
pub use guardrails::{GuardrailLinter, GuardrailViolation, LintReport};
pub use identity::{IdentityDelta, IdentityGraph, IdentitySnapshot};
pub use llms::{GenerationBackend, ProviderChain};
pub use orchestrator::{Orchestrator, SubmitResult};
pub use tone::{ToneDecision, ToneDecisionEngine};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
