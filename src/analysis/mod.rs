//! Structured analyzer output consumed by the pipeline.
//!
//! Emotion, semantic, logic and grounding analysis are produced outside the
//! core. The pipeline depends only on the [`Analyzer`] trait;
//! [`HeuristicAnalyzer`] is a lexical stand-in that can be replaced.

pub mod heuristic;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, ValidationError};
use crate::identity::IdentitySnapshot;

pub use heuristic::HeuristicAnalyzer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
    /// -1 (negative) to 1 (positive).
    pub valence: f64,
    /// 0 (calm) to 1 (activated).
    pub arousal: f64,
    pub intensity: f64,
}

impl Default for EmotionAnalysis {
    fn default() -> Self {
        Self {
            primary: "neutral".to_string(),
            secondary: None,
            valence: 0.0,
            arousal: 0.5,
            intensity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnalysis {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub core_question: Option<String>,
    #[serde(default)]
    pub hidden_questions: Vec<String>,
    #[serde(default)]
    pub beliefs_stated: Vec<String>,
    #[serde(default)]
    pub beliefs_implied: Vec<String>,
    #[serde(default)]
    pub self_stories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    Hard,
    Soft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub claim_a: String,
    pub claim_b: String,
    #[serde(rename = "type")]
    pub kind: ContradictionKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicAnalysis {
    #[serde(default)]
    pub claims: Vec<String>,
    #[serde(default)]
    pub implied_claims: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<Contradiction>,
    #[serde(default)]
    pub paradoxes: Vec<String>,
    #[serde(default)]
    pub possible_paths: Vec<String>,
}

impl LogicAnalysis {
    pub fn has_hard_contradiction(&self) -> bool {
        self.contradictions.iter().any(|c| c.kind == ContradictionKind::Hard)
    }

    pub fn has_soft_contradiction(&self) -> bool {
        self.contradictions.iter().any(|c| c.kind == ContradictionKind::Soft)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingResult {
    pub needed: bool,
    #[serde(default)]
    pub retrieved_facts: Vec<String>,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Everything the analyzers say about one reflection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub emotion: EmotionAnalysis,
    pub semantic: SemanticAnalysis,
    pub logic: LogicAnalysis,
    pub grounding: GroundingResult,
}

impl AnalysisInput {
    /// Reject analyzer output with missing or out-of-range fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let e = &self.emotion;
        if e.primary.trim().is_empty() {
            return Err(ValidationError::new("emotion.primary", "must not be empty"));
        }
        let ranges = [
            ("emotion.valence", e.valence, -1.0, 1.0),
            ("emotion.arousal", e.arousal, 0.0, 1.0),
            ("emotion.intensity", e.intensity, 0.0, 1.0),
        ];
        for (field, value, lo, hi) in ranges {
            if !value.is_finite() || value < lo || value > hi {
                return Err(ValidationError::new(
                    field,
                    format!("{} is outside [{}, {}]", value, lo, hi),
                ));
            }
        }
        if let Some(c) = self
            .logic
            .contradictions
            .iter()
            .find(|c| c.claim_a.trim().is_empty() || c.claim_b.trim().is_empty())
        {
            return Err(ValidationError::new(
                "logic.contradictions",
                format!("contradiction with an empty claim: {:?}", c),
            ));
        }
        Ok(())
    }
}

/// Produces structured analysis for a reflection.
#[async_trait]
pub trait Analyzer: Send + Sync + fmt::Debug {
    async fn analyze(
        &self,
        text: &str,
        snapshot: &IdentitySnapshot,
    ) -> Result<AnalysisInput, AnalyzerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_default() {
        assert!(AnalysisInput::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut input = AnalysisInput::default();
        input.emotion.arousal = 1.4;
        assert_eq!(input.validate().unwrap_err().field, "emotion.arousal");

        let mut input = AnalysisInput::default();
        input.emotion.valence = f64::NAN;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_primary() {
        let mut input = AnalysisInput::default();
        input.emotion.primary = "  ".into();
        assert_eq!(input.validate().unwrap_err().field, "emotion.primary");
    }

    #[test]
    fn test_contradiction_type_field_name() {
        let json = r#"{"claim_a":"a","claim_b":"b","type":"hard"}"#;
        let c: Contradiction = serde_json::from_str(json).unwrap();
        assert_eq!(c.kind, ContradictionKind::Hard);
    }
}
