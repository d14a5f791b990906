//! Response planning.
//!
//! A remote backend is asked to compress the bundle into a small JSON plan.
//! When no remote backend answers, or the answer is not a usable plan, a
//! rule-based plan is built straight from the bundle. That path cannot fail.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::MirrorConfig;
use crate::identity::{BeliefStatus, TensionType};
use crate::llms::ProviderChain;
use crate::orchestrator::{OrchestratorBundle, StageOutcome};
use crate::utilities::prompts::render;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Clarifying,
    Reflective,
    PatternNaming,
    Paradox,
    Grounding,
    Curiosity,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clarifying => "clarifying",
            Self::Reflective => "reflective",
            Self::PatternNaming => "pattern_naming",
            Self::Paradox => "paradox",
            Self::Grounding => "grounding",
            Self::Curiosity => "curiosity",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Backend,
    #[default]
    Fallback,
}

/// Compact plan the draft is generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePlan {
    #[serde(default)]
    pub key_beliefs: Vec<String>,
    #[serde(default)]
    pub relevant_tensions: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    pub question_types: Vec<QuestionType>,
    #[serde(default)]
    pub tone_notes: String,
    #[serde(default, skip_deserializing)]
    pub source: PlanSource,
}

impl ResponsePlan {
    /// Parse a backend answer, tolerating a fenced code block or prose
    /// around the JSON object. A plan without question types is rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let json = FENCED_JSON
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .or_else(|| {
                let start = raw.find('{')?;
                let end = raw.rfind('}')?;
                (start < end).then(|| &raw[start..=end])
            })
            .ok_or_else(|| "no JSON object in response".to_string())?;

        let mut plan: ResponsePlan =
            serde_json::from_str(json).map_err(|e| format!("invalid plan JSON: {}", e))?;
        if plan.question_types.is_empty() {
            return Err("plan has no question types".to_string());
        }
        plan.source = PlanSource::Backend;
        Ok(plan)
    }
}

/// The strongest evolution signal in a bundle, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominantSignal {
    Regression,
    Loop,
    Paradox,
    Growth,
    None,
}

impl DominantSignal {
    pub fn of(bundle: &OrchestratorBundle) -> Self {
        let identity = &bundle.identity;
        if identity.has_active_regression() {
            Self::Regression
        } else if identity.active_loop_count() > 0 || !identity.reasoning_loops.is_empty() {
            Self::Loop
        } else if !bundle.logic.paradoxes.is_empty()
            || identity
                .dominant_tension
                .as_ref()
                .is_some_and(|t| t.kind == TensionType::Paradox)
        {
            Self::Paradox
        } else if !identity.growth_signals.is_empty() {
            Self::Growth
        } else {
            Self::None
        }
    }

    pub fn question_type(self) -> QuestionType {
        match self {
            Self::Regression => QuestionType::Grounding,
            Self::Loop => QuestionType::PatternNaming,
            Self::Paradox => QuestionType::Paradox,
            Self::Growth => QuestionType::Reflective,
            Self::None => QuestionType::Curiosity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisStage {
    top_n: usize,
    system: String,
    template: String,
}

impl Default for SynthesisStage {
    fn default() -> Self {
        Self::from_config(&MirrorConfig::default())
    }
}

impl SynthesisStage {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            top_n: config.synthesis_top_n.max(1),
            system: config.prompts.synthesis_system.clone(),
            template: config.prompts.synthesis_prompt.clone(),
        }
    }

    /// Ask a remote backend for a plan. One attempt per backend; any failure
    /// yields the rule-based plan with the reason attached.
    pub async fn plan(&self, bundle: &OrchestratorBundle, chain: &ProviderChain) -> StageOutcome<ResponsePlan> {
        if !chain.has_remote() {
            return StageOutcome::fallback(self.fallback_plan(bundle), "no remote backend configured");
        }
        let bundle_json = match serde_json::to_string_pretty(bundle) {
            Ok(json) => json,
            Err(e) => {
                return StageOutcome::fallback(
                    self.fallback_plan(bundle),
                    format!("bundle not serializable: {}", e),
                )
            }
        };
        let prompt = render(&self.template, &[("bundle", bundle_json)]);

        match chain.generate_remote(&prompt, &self.system).await {
            Ok((raw, served)) => match ResponsePlan::parse(&raw) {
                Ok(plan) => {
                    log::debug!("plan synthesized by {}", served.name);
                    StageOutcome::Completed(plan)
                }
                Err(reason) => StageOutcome::fallback(self.fallback_plan(bundle), reason),
            },
            Err(e) => StageOutcome::fallback(self.fallback_plan(bundle), e.to_string()),
        }
    }

    /// Rule-based plan from bundle fields, in presence order.
    pub fn fallback_plan(&self, bundle: &OrchestratorBundle) -> ResponsePlan {
        let n = self.top_n;

        let mut key_beliefs: Vec<String> = Vec::new();
        let stated = bundle.semantic.beliefs_stated.iter().chain(&bundle.semantic.beliefs_implied);
        let known = bundle
            .identity
            .beliefs()
            .filter(|b| b.status != BeliefStatus::Rejected)
            .map(|b| &b.label);
        for label in stated.chain(known) {
            if key_beliefs.len() == n {
                break;
            }
            if !key_beliefs.iter().any(|b| b.eq_ignore_ascii_case(label)) {
                key_beliefs.push(label.clone());
            }
        }

        let dominant = bundle.identity.dominant_tension.as_ref();
        let mut relevant_tensions: Vec<String> = dominant.map(|t| t.label.clone()).into_iter().collect();
        relevant_tensions.extend(
            bundle
                .identity
                .active_tensions()
                .filter(|t| dominant.map_or(true, |d| d.key() != t.key()))
                .map(|t| t.label.clone()),
        );
        relevant_tensions.truncate(n);

        let contradictions = bundle
            .logic
            .contradictions
            .iter()
            .take(n)
            .map(|c| format!("\"{}\" / \"{}\"", c.claim_a, c.claim_b))
            .collect();

        let mut question_types = vec![DominantSignal::of(bundle).question_type()];
        if bundle.semantic.core_question.is_some() && !question_types.contains(&QuestionType::Clarifying) {
            question_types.push(QuestionType::Clarifying);
        }

        let tone = &bundle.tone;
        ResponsePlan {
            key_beliefs,
            relevant_tensions,
            contradictions,
            question_types,
            tone_notes: format!(
                "{} tone, {} intensity, focus on {}",
                tone.mirror_tone, tone.intensity, tone.focus
            ),
            source: PlanSource::Fallback,
        }
    }
}
