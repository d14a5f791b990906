//! Reflection pipeline.
//!
//! `crisis_check → build_bundle → decide_tone → synthesize_plan →
//! generate_draft → lint_and_repair → commit_state`
//!
//! Every stage after the crisis check either completes or substitutes a
//! fallback and carries on. Only malformed input, graph consistency errors,
//! an unreadable stored state, or cancellation abort a request.

pub mod bundle;
pub mod crisis;
pub mod stage;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analysis::{AnalysisInput, Analyzer, HeuristicAnalyzer};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result, ValidationError};
use crate::evolution::{Breakthrough, GrowthMetrics, RegressionMarker};
use crate::guardrails::{GuardrailLinter, GuardrailViolation, RepairMethod};
use crate::identity::{IdentityDelta, IdentitySnapshot};
use crate::llms::{BackendKind, GenerationRequest, ProviderChain, ServedBy};
use crate::store::{AuditRecord, AuditSink, LogAuditSink, StateRepository, UserStateStore};
use crate::synthesis::{ResponsePlan, SynthesisStage};
use crate::tone::{ToneDecision, ToneDecisionEngine};
use crate::utilities::prompts::render;

pub use bundle::{BundleBuilder, OrchestratorBundle};
pub use crisis::CrisisDetector;
pub use stage::{PipelineStage, StageLog, StageOutcome, StageRecord, StageStatus};

/// What the caller gets back for one reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub request_id: Uuid,
    pub mirrorback_text: String,
    /// Absent when the crisis bypass fired.
    pub tone_decision: Option<ToneDecision>,
    pub identity_delta: Option<IdentityDelta>,
    pub delta_summary: Option<String>,
    pub lint_passed: bool,
    pub violations: Vec<GuardrailViolation>,
    pub bypassed: bool,
    pub served_by: Option<ServedBy>,
    pub stages: Vec<StageRecord>,
}

impl SubmitResult {
    fn bypass(request_id: Uuid, message: &str, stages: StageLog) -> Self {
        Self {
            request_id,
            mirrorback_text: message.to_string(),
            tone_decision: None,
            identity_delta: None,
            delta_summary: None,
            lint_passed: true,
            violations: Vec::new(),
            bypassed: true,
            served_by: None,
            stages: stages.into_records(),
        }
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    config: MirrorConfig,
    analyzer: Arc<dyn Analyzer>,
    chain: ProviderChain,
    tone: ToneDecisionEngine,
    synthesis: SynthesisStage,
    linter: GuardrailLinter,
    crisis: CrisisDetector,
    store: UserStateStore,
    audit: Arc<dyn AuditSink>,
}

impl Orchestrator {
    /// Build an orchestrator with the heuristic analyzer, the provider chain
    /// described by `config`, in-memory state and a logging audit sink.
    pub fn new(config: MirrorConfig) -> std::result::Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            analyzer: Arc::new(HeuristicAnalyzer::new()),
            chain: ProviderChain::from_config(&config),
            tone: ToneDecisionEngine::new(),
            synthesis: SynthesisStage::from_config(&config),
            linter: GuardrailLinter::from_config(&config),
            crisis: CrisisDetector::from_config(&config),
            store: UserStateStore::in_memory(config.clone()),
            audit: Arc::new(LogAuditSink),
            config,
        })
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_chain(mut self, chain: ProviderChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn StateRepository>) -> Self {
        self.store = UserStateStore::new(self.config.clone(), repository);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub async fn submit_reflection(&self, user_id: &str, text: &str) -> Result<SubmitResult> {
        self.submit_reflection_with_cancel(user_id, text, &CancellationToken::new())
            .await
    }

    /// Run the pipeline for one reflection.
    ///
    /// The user's state is locked for the whole run and mutated on a working
    /// copy that is committed only after the last cancellation check, so a
    /// cancelled or failed request leaves the stored state untouched.
    pub async fn submit_reflection_with_cancel(
        &self,
        user_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<SubmitResult> {
        validate_request(user_id, text)?;
        let request_id = Uuid::new_v4();
        let mut stages = StageLog::new();

        // ---- crisis_check ----
        log::debug!("[{}] {}", request_id, PipelineStage::CrisisCheck);
        if let Some(keyword) = self.crisis.matched_keyword(text) {
            log::warn!(
                "[{}] crisis phrase '{}' matched for user {}; bypassing generation",
                request_id,
                keyword,
                user_id
            );
            stages.completed(PipelineStage::CrisisCheck);
            let result = SubmitResult::bypass(request_id, self.crisis.message(), stages);
            self.record_audit(user_id, &result);
            return Ok(result);
        }
        stages.completed(PipelineStage::CrisisCheck);
        ensure_live(cancel)?;

        let handle = self.store.handle(user_id).await?;
        let mut state = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MirrorError::Cancelled),
            guard = handle.lock() => guard,
        };
        let mut working = state.clone();
        let before = working.snapshot();

        // ---- build_bundle ----
        log::debug!("[{}] {}", request_id, PipelineStage::BuildBundle);
        let outcome = self.analyze(text, &before, cancel).await?;
        let analysis = stages.track(PipelineStage::BuildBundle, outcome);
        analysis.validate()?;
        working.ingest(text, &analysis)?;
        let after = working.snapshot();
        let delta = IdentityDelta::between(&before, &after);
        let builder = BundleBuilder::new().analysis(analysis).identity(after);

        // ---- decide_tone ----
        log::debug!("[{}] {}", request_id, PipelineStage::DecideTone);
        let (rule, tone) = match (builder.emotion_ref(), builder.identity_ref(), builder.logic_ref()) {
            (Some(emotion), Some(identity), Some(logic)) => {
                self.tone.decide_with_rule(emotion, identity, logic)
            }
            _ => return Err(ValidationError::new("bundle", "incomplete before tone decision").into()),
        };
        log::debug!("[{}] tone {} via rule '{}'", request_id, tone, rule);
        stages.completed(PipelineStage::DecideTone);
        let bundle = builder.tone(tone).build()?;
        ensure_live(cancel)?;

        // ---- synthesize_plan ----
        log::debug!("[{}] {}", request_id, PipelineStage::SynthesizePlan);
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MirrorError::Cancelled),
            plan = self.synthesis.plan(&bundle, &self.chain) => plan,
        };
        if let Some(reason) = outcome.fallback_reason() {
            log::warn!("[{}] synthesis fell back: {}", request_id, reason);
        }
        let plan = stages.track(PipelineStage::SynthesizePlan, outcome);

        // ---- generate_draft ----
        log::debug!("[{}] {}", request_id, PipelineStage::GenerateDraft);
        let prompt = self.draft_prompt(text, &plan, &tone);
        let request = GenerationRequest {
            system: &self.config.prompts.mirror_system,
            prompt: &prompt,
            echo_source: text,
        };
        let output = self.chain.generate_cancellable(&request, cancel).await?;
        if output.served_by.kind == BackendKind::LocalEcho {
            let reason = if output.failures.is_empty() {
                "no remote backend configured".to_string()
            } else {
                format!("{} remote backend(s) failed", output.failures.len())
            };
            stages.fell_back(PipelineStage::GenerateDraft, reason);
        } else {
            stages.completed(PipelineStage::GenerateDraft);
        }

        // ---- lint_and_repair ----
        log::debug!("[{}] {}", request_id, PipelineStage::LintAndRepair);
        let linted = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MirrorError::Cancelled),
            outcome = self.linter.enforce(&output.text, &self.chain) => outcome,
        };
        match linted.repair {
            None => stages.completed(PipelineStage::LintAndRepair),
            Some(method) => {
                let how = match method {
                    RepairMethod::StrictRewrite => "strict rewrite",
                    RepairMethod::LocalRepair => "local repair",
                };
                stages.fell_back(
                    PipelineStage::LintAndRepair,
                    format!("{} violation(s) handled by {}", linted.violations.len(), how),
                );
            }
        }

        // Last point at which the request can still be abandoned.
        ensure_live(cancel)?;

        // ---- commit_state ----
        log::debug!("[{}] {}", request_id, PipelineStage::CommitState);
        *state = working;
        match self.store.save(user_id, &state).await {
            Ok(()) => stages.completed(PipelineStage::CommitState),
            Err(e) => {
                log::warn!("[{}] state for user {} not persisted: {}", request_id, user_id, e);
                stages.fell_back(PipelineStage::CommitState, e.to_string());
            }
        }
        drop(state);

        let summary = delta.summary();
        let result = SubmitResult {
            request_id,
            mirrorback_text: linted.text,
            tone_decision: Some(tone),
            delta_summary: Some(summary),
            identity_delta: Some(delta),
            lint_passed: linted.passed,
            violations: linted.violations,
            bypassed: false,
            served_by: Some(output.served_by),
            stages: stages.into_records(),
        };
        self.record_audit(user_id, &result);
        log::info!(
            "[{}] user={} served_by={} tone={} lint_passed={}",
            request_id,
            user_id,
            result.served_by.as_ref().map_or("none", |s| s.name.as_str()),
            tone,
            result.lint_passed
        );
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Read-side queries
    // -----------------------------------------------------------------------

    /// Current snapshot. Waits for any in-flight reflection of this user.
    pub async fn get_identity_snapshot(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let handle = self.store.handle(user_id).await?;
        let state = handle.lock().await;
        Ok(state.snapshot())
    }

    /// Every regression marker recorded for the user, oldest first.
    pub async fn get_regression_markers(&self, user_id: &str) -> Result<Vec<RegressionMarker>> {
        let handle = self.store.handle(user_id).await?;
        let state = handle.lock().await;
        Ok(state.tracker.regression_markers().to_vec())
    }

    pub async fn get_growth_metrics(&self, user_id: &str) -> Result<GrowthMetrics> {
        let handle = self.store.handle(user_id).await?;
        let state = handle.lock().await;
        Ok(state.tracker.calculate_growth_metrics())
    }

    pub async fn get_breakthroughs(&self, user_id: &str) -> Result<Vec<Breakthrough>> {
        let handle = self.store.handle(user_id).await?;
        let state = handle.lock().await;
        Ok(state.tracker.identify_breakthroughs())
    }

    // -----------------------------------------------------------------------
    // Stage helpers
    // -----------------------------------------------------------------------

    /// Run the configured analyzer. If it fails, the heuristic analyzer's
    /// reading is used instead.
    async fn analyze(
        &self,
        text: &str,
        snapshot: &IdentitySnapshot,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome<AnalysisInput>> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MirrorError::Cancelled),
            r = self.analyzer.analyze(text, snapshot) => r,
        };
        Ok(match result {
            Ok(input) => StageOutcome::Completed(input),
            Err(e) => {
                log::warn!("analyzer failed, using heuristic reading: {}", e);
                let fallback = HeuristicAnalyzer::new()
                    .analyze(text, snapshot)
                    .await
                    .unwrap_or_default();
                StageOutcome::fallback(fallback, e.to_string())
            }
        })
    }

    fn draft_prompt(&self, text: &str, plan: &ResponsePlan, tone: &ToneDecision) -> String {
        let plan_json = serde_json::to_string_pretty(plan).unwrap_or_else(|_| format!("{:?}", plan));
        render(
            &self.config.prompts.mirror_prompt,
            &[
                ("reflection", text.to_string()),
                ("plan", plan_json),
                ("tone", tone.mirror_tone.to_string()),
                ("intensity", tone.intensity.to_string()),
                ("focus", tone.focus.to_string()),
            ],
        )
    }

    fn record_audit(&self, user_id: &str, result: &SubmitResult) {
        self.audit.record(AuditRecord {
            user_id: user_id.to_string(),
            request_id: result.request_id,
            timestamp: chrono::Utc::now(),
            stages: result.stages.clone(),
            tone: result.tone_decision,
            violations: result.violations.clone(),
            served_by: result.served_by.clone(),
            bypassed: result.bypassed,
        });
    }
}

fn validate_request(user_id: &str, text: &str) -> std::result::Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::new("user_id", "must not be empty"));
    }
    if text.trim().is_empty() {
        return Err(ValidationError::new("text", "must not be empty"));
    }
    Ok(())
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MirrorError::Cancelled);
    }
    Ok(())
}
