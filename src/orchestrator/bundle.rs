//! The per-request analysis bundle.

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisInput, EmotionAnalysis, GroundingResult, LogicAnalysis, SemanticAnalysis};
use crate::error::ValidationError;
use crate::identity::IdentitySnapshot;
use crate::tone::ToneDecision;

/// Everything known about one reflection. Built fresh per request and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorBundle {
    pub emotion: EmotionAnalysis,
    pub identity: IdentitySnapshot,
    pub semantic: SemanticAnalysis,
    pub logic: LogicAnalysis,
    pub grounding: GroundingResult,
    pub tone: ToneDecision,
}

/// Collects bundle parts; [`build`](Self::build) rejects a bundle with any
/// part missing.
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    emotion: Option<EmotionAnalysis>,
    identity: Option<IdentitySnapshot>,
    semantic: Option<SemanticAnalysis>,
    logic: Option<LogicAnalysis>,
    grounding: Option<GroundingResult>,
    tone: Option<ToneDecision>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all analyzer outputs at once.
    pub fn analysis(self, input: AnalysisInput) -> Self {
        self.emotion(input.emotion)
            .semantic(input.semantic)
            .logic(input.logic)
            .grounding(input.grounding)
    }

    pub fn emotion(mut self, emotion: EmotionAnalysis) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn identity(mut self, identity: IdentitySnapshot) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn semantic(mut self, semantic: SemanticAnalysis) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn logic(mut self, logic: LogicAnalysis) -> Self {
        self.logic = Some(logic);
        self
    }

    pub fn grounding(mut self, grounding: GroundingResult) -> Self {
        self.grounding = Some(grounding);
        self
    }

    pub fn tone(mut self, tone: ToneDecision) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn emotion_ref(&self) -> Option<&EmotionAnalysis> {
        self.emotion.as_ref()
    }

    pub fn identity_ref(&self) -> Option<&IdentitySnapshot> {
        self.identity.as_ref()
    }

    pub fn logic_ref(&self) -> Option<&LogicAnalysis> {
        self.logic.as_ref()
    }

    pub fn build(self) -> Result<OrchestratorBundle, ValidationError> {
        fn require<T>(part: Option<T>, field: &str) -> Result<T, ValidationError> {
            part.ok_or_else(|| ValidationError::new(format!("bundle.{}", field), "missing"))
        }
        Ok(OrchestratorBundle {
            emotion: require(self.emotion, "emotion")?,
            identity: require(self.identity, "identity")?,
            semantic: require(self.semantic, "semantic")?,
            logic: require(self.logic, "logic")?,
            grounding: require(self.grounding, "grounding")?,
            tone: require(self.tone, "tone")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::{Focus, Intensity, MirrorTone};

    #[test]
    fn test_build_complete_bundle() {
        let bundle = BundleBuilder::new()
            .analysis(AnalysisInput::default())
            .identity(IdentitySnapshot::default())
            .tone(ToneDecision::new(MirrorTone::Soft, Intensity::Low, Focus::Story))
            .build()
            .unwrap();
        assert_eq!(bundle.tone.mirror_tone, MirrorTone::Soft);
    }

    #[test]
    fn test_missing_part_is_validation_error() {
        let err = BundleBuilder::new()
            .analysis(AnalysisInput::default())
            .identity(IdentitySnapshot::default())
            .build()
            .unwrap_err();
        assert_eq!(err.field, "bundle.tone");
    }
}
