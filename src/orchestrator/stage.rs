//! Pipeline stages and their tagged outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    CrisisCheck,
    BuildBundle,
    DecideTone,
    SynthesizePlan,
    GenerateDraft,
    LintAndRepair,
    CommitState,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CrisisCheck => "crisis_check",
            Self::BuildBundle => "build_bundle",
            Self::DecideTone => "decide_tone",
            Self::SynthesizePlan => "synthesize_plan",
            Self::GenerateDraft => "generate_draft",
            Self::LintAndRepair => "lint_and_repair",
            Self::CommitState => "commit_state",
        })
    }
}

/// What a stage produced: its own value, or a documented substitute.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Fallback { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self::Fallback {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Completed(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Completed(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Fallback { reason, .. } => Some(reason.as_str()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Audit-trail form of an outcome, without the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub outcome: StageStatus,
}

/// Ordered record of the stages one request actually executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageLog(Vec<StageRecord>);

impl StageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&mut self, stage: PipelineStage) {
        log::debug!("stage {} completed", stage);
        self.0.push(StageRecord {
            stage,
            outcome: StageStatus::Completed,
        });
    }

    pub fn fell_back(&mut self, stage: PipelineStage, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("stage {} fell back: {}", stage, reason);
        self.0.push(StageRecord {
            stage,
            outcome: StageStatus::Fallback(reason),
        });
    }

    /// Record `outcome` and hand back its value.
    pub fn track<T>(&mut self, stage: PipelineStage, outcome: StageOutcome<T>) -> T {
        match outcome {
            StageOutcome::Completed(value) => {
                self.completed(stage);
                value
            }
            StageOutcome::Fallback { value, reason } => {
                self.fell_back(stage, reason);
                value
            }
        }
    }

    pub fn stages(&self) -> Vec<PipelineStage> {
        self.0.iter().map(|r| r.stage).collect()
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.0
    }

    pub fn into_records(self) -> Vec<StageRecord> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_records_fallback_reason() {
        let mut log = StageLog::new();
        let plan = log.track(PipelineStage::SynthesizePlan, StageOutcome::fallback(7, "malformed JSON"));
        assert_eq!(plan, 7);
        let value = log.track(PipelineStage::GenerateDraft, StageOutcome::Completed("draft"));
        assert_eq!(value, "draft");
        assert_eq!(
            log.records()[0].outcome,
            StageStatus::Fallback("malformed JSON".into())
        );
        assert_eq!(
            log.stages(),
            vec![PipelineStage::SynthesizePlan, PipelineStage::GenerateDraft]
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let o = StageOutcome::fallback("x", "why");
        assert!(o.is_fallback());
        assert_eq!(o.fallback_reason(), Some("why"));
        assert_eq!(*o.value(), "x");
        assert_eq!(StageOutcome::Completed(1).fallback_reason(), None);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&StageRecord {
            stage: PipelineStage::LintAndRepair,
            outcome: StageStatus::Fallback("local repair".into()),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"stage":"lint_and_repair","outcome":{"status":"fallback","reason":"local repair"}}"#
        );
    }
}
