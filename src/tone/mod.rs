//! Tone decision: an ordered rule table mapping emotion, identity and logic
//! signals to a response strategy.
//!
//! Rules are evaluated top to bottom and the first matching predicate wins.
//! The engine holds no state and performs no I/O, so identical inputs always
//! produce the identical decision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::{EmotionAnalysis, LogicAnalysis};
use crate::identity::IdentitySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorTone {
    Soft,
    Direct,
    Playful,
    Austere,
    Silent,
    Provocative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Focus {
    Emotion,
    Logic,
    Story,
    Paradox,
}

macro_rules! display_snake {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name),+
                })
            }
        }
    };
}

display_snake!(MirrorTone {
    Soft => "soft",
    Direct => "direct",
    Playful => "playful",
    Austere => "austere",
    Silent => "silent",
    Provocative => "provocative",
});
display_snake!(Intensity { Low => "low", Medium => "medium", High => "high" });
display_snake!(Focus { Emotion => "emotion", Logic => "logic", Story => "story", Paradox => "paradox" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToneDecision {
    pub mirror_tone: MirrorTone,
    pub intensity: Intensity,
    pub focus: Focus,
}

impl ToneDecision {
    pub const fn new(mirror_tone: MirrorTone, intensity: Intensity, focus: Focus) -> Self {
        Self { mirror_tone, intensity, focus }
    }
}

impl fmt::Display for ToneDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.mirror_tone, self.intensity, self.focus)
    }
}

/// Emotion labels treated as acute distress.
pub const CRISIS_EMOTIONS: &[&str] = &["despair", "panic", "terror", "hopelessness", "crisis"];

/// Emotion labels that invite a more probing reply when the writer is resourced.
pub const CONTEMPLATIVE_EMOTIONS: &[&str] =
    &["curiosity", "calm", "wonder", "contemplative", "reflective", "pensive"];

/// Inputs one rule sees.
#[derive(Debug, Clone, Copy)]
pub struct ToneContext<'a> {
    pub emotion: &'a EmotionAnalysis,
    pub identity: &'a IdentitySnapshot,
    pub logic: &'a LogicAnalysis,
}

impl ToneContext<'_> {
    /// Positive and not over-activated.
    pub fn resourced(&self) -> bool {
        self.emotion.valence > 0.0 && self.emotion.arousal < 0.7
    }

    fn has_label(&self, labels: &[&str]) -> bool {
        let primary = self.emotion.primary.to_lowercase();
        labels.contains(&primary.as_str())
    }
}

/// One row of the rule table.
#[derive(Clone, Copy)]
pub struct ToneRule {
    pub name: &'static str,
    pub predicate: fn(&ToneContext<'_>) -> bool,
    pub decision: ToneDecision,
}

impl fmt::Debug for ToneRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToneRule")
            .field("name", &self.name)
            .field("decision", &self.decision)
            .finish()
    }
}

use Focus as F;
use Intensity as I;
use MirrorTone as T;

/// The rule table in priority order.
pub const DEFAULT_RULES: &[ToneRule] = &[
    ToneRule {
        name: "crisis_or_high_distress",
        predicate: |c| {
            c.has_label(CRISIS_EMOTIONS) || (c.emotion.valence < -0.5 && c.emotion.intensity > 0.6)
        },
        decision: ToneDecision::new(T::Soft, I::Low, F::Emotion),
    },
    ToneRule {
        name: "recurring_loops",
        predicate: |c| c.identity.active_loop_count() >= 3,
        decision: ToneDecision::new(T::Direct, I::Medium, F::Logic),
    },
    ToneRule {
        name: "hard_contradiction_resourced",
        predicate: |c| c.logic.has_hard_contradiction() && c.resourced(),
        decision: ToneDecision::new(T::Direct, I::Medium, F::Logic),
    },
    ToneRule {
        name: "paradox_resourced",
        predicate: |c| !c.logic.paradoxes.is_empty() && c.resourced(),
        decision: ToneDecision::new(T::Playful, I::Medium, F::Paradox),
    },
    ToneRule {
        name: "active_regression",
        predicate: |c| c.identity.has_active_regression(),
        decision: ToneDecision::new(T::Soft, I::Low, F::Story),
    },
    ToneRule {
        name: "contemplative_resourced",
        predicate: |c| c.has_label(CONTEMPLATIVE_EMOTIONS) && c.resourced(),
        decision: ToneDecision::new(T::Provocative, I::Medium, F::Paradox),
    },
    ToneRule {
        name: "low_arousal",
        predicate: |c| c.emotion.arousal < 0.3,
        decision: ToneDecision::new(T::Austere, I::Low, F::Emotion),
    },
    ToneRule {
        name: "soft_contradiction",
        predicate: |c| c.logic.has_soft_contradiction(),
        decision: ToneDecision::new(T::Soft, I::Medium, F::Paradox),
    },
    ToneRule {
        name: "default",
        predicate: |_| true,
        decision: ToneDecision::new(T::Austere, I::Low, F::Story),
    },
];

/// First-match-wins evaluator over a rule table.
#[derive(Debug, Clone)]
pub struct ToneDecisionEngine {
    rules: Vec<ToneRule>,
    fallback: ToneDecision,
}

impl Default for ToneDecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneDecisionEngine {
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }

    /// Custom table. If no rule matches, the default `(austere, low, story)`
    /// decision is returned.
    pub fn with_rules(rules: Vec<ToneRule>) -> Self {
        Self {
            rules,
            fallback: ToneDecision::new(T::Austere, I::Low, F::Story),
        }
    }

    pub fn rules(&self) -> &[ToneRule] {
        &self.rules
    }

    pub fn decide_tone(
        &self,
        emotion: &EmotionAnalysis,
        identity: &IdentitySnapshot,
        logic: &LogicAnalysis,
    ) -> ToneDecision {
        self.decide_with_rule(emotion, identity, logic).1
    }

    /// Decision together with the name of the rule that produced it.
    pub fn decide_with_rule(
        &self,
        emotion: &EmotionAnalysis,
        identity: &IdentitySnapshot,
        logic: &LogicAnalysis,
    ) -> (&'static str, ToneDecision) {
        let ctx = ToneContext { emotion, identity, logic };
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(&ctx))
            .map_or(("default", self.fallback), |rule| (rule.name, rule.decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Contradiction, ContradictionKind};
    use crate::evolution::{Loop, RegressionKind, RegressionMarker};
    use uuid::Uuid;

    fn emotion(primary: &str, valence: f64, arousal: f64, intensity: f64) -> EmotionAnalysis {
        EmotionAnalysis {
            primary: primary.into(),
            secondary: None,
            valence,
            arousal,
            intensity,
        }
    }

    fn looping(n: usize) -> IdentitySnapshot {
        let loops = (0..n)
            .map(|i| Loop {
                pattern_id: Uuid::new_v4(),
                occurrences: 2,
                strength: 0.4,
                broken: false,
                entry_ids: Vec::new(),
                last_seen: i,
            })
            .collect();
        IdentitySnapshot {
            loops,
            ..IdentitySnapshot::default()
        }
    }

    fn regressed() -> IdentitySnapshot {
        IdentitySnapshot {
            regressions: vec![RegressionMarker::new(RegressionKind::SelfAttack, 3, "x")],
            ..IdentitySnapshot::default()
        }
    }

    fn contradiction(kind: ContradictionKind) -> LogicAnalysis {
        LogicAnalysis {
            contradictions: vec![Contradiction {
                claim_a: "I want to stay".into(),
                claim_b: "I don't want to stay".into(),
                kind,
            }],
            ..LogicAnalysis::default()
        }
    }

    fn decide(e: &EmotionAnalysis, s: &IdentitySnapshot, l: &LogicAnalysis) -> (&'static str, ToneDecision) {
        ToneDecisionEngine::new().decide_with_rule(e, s, l)
    }

    #[test]
    fn test_rule_order_matches_table() {
        let names: Vec<_> = ToneDecisionEngine::new().rules().iter().map(|r| r.name).collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "crisis_or_high_distress");
        assert_eq!(names[8], "default");
    }

    #[test]
    fn test_high_distress_beats_everything() {
        let e = emotion("sadness", -0.7, 0.5, 0.8);
        let (name, d) = decide(&e, &looping(4), &contradiction(ContradictionKind::Hard));
        assert_eq!(name, "crisis_or_high_distress");
        assert_eq!(d, ToneDecision::new(T::Soft, I::Low, F::Emotion));
    }

    #[test]
    fn test_crisis_label() {
        let e = emotion("despair", 0.1, 0.5, 0.2);
        assert_eq!(decide(&e, &IdentitySnapshot::default(), &LogicAnalysis::default()).0, "crisis_or_high_distress");
    }

    #[test]
    fn test_three_loops_direct() {
        let e = emotion("neutral", 0.0, 0.5, 0.2);
        let (name, d) = decide(&e, &looping(3), &LogicAnalysis::default());
        assert_eq!(name, "recurring_loops");
        assert_eq!(d, ToneDecision::new(T::Direct, I::Medium, F::Logic));
        assert_eq!(decide(&e, &looping(2), &LogicAnalysis::default()).0, "default");
    }

    #[test]
    fn test_hard_contradiction_needs_resourced() {
        let logic = contradiction(ContradictionKind::Hard);
        let resourced = emotion("joy", 0.4, 0.5, 0.3);
        assert_eq!(decide(&resourced, &IdentitySnapshot::default(), &logic).0, "hard_contradiction_resourced");

        let activated = emotion("joy", 0.4, 0.8, 0.3);
        assert_eq!(decide(&activated, &IdentitySnapshot::default(), &logic).0, "default");
    }

    #[test]
    fn test_paradox_playful() {
        let logic = LogicAnalysis {
            paradoxes: vec!["both free and trapped".into()],
            ..LogicAnalysis::default()
        };
        let e = emotion("joy", 0.3, 0.5, 0.3);
        let (name, d) = decide(&e, &IdentitySnapshot::default(), &logic);
        assert_eq!(name, "paradox_resourced");
        assert_eq!(d, ToneDecision::new(T::Playful, I::Medium, F::Paradox));
    }

    #[test]
    fn test_regression_soft_story() {
        let e = emotion("shame", -0.3, 0.5, 0.4);
        let (name, d) = decide(&e, &regressed(), &LogicAnalysis::default());
        assert_eq!(name, "active_regression");
        assert_eq!(d, ToneDecision::new(T::Soft, I::Low, F::Story));
    }

    #[test]
    fn test_contemplative_provocative() {
        let e = emotion("curiosity", 0.4, 0.4, 0.3);
        let (name, d) = decide(&e, &IdentitySnapshot::default(), &LogicAnalysis::default());
        assert_eq!(name, "contemplative_resourced");
        assert_eq!(d, ToneDecision::new(T::Provocative, I::Medium, F::Paradox));
    }

    #[test]
    fn test_low_arousal_austere() {
        let e = emotion("fatigue", -0.3, 0.1, 0.3);
        let (name, d) = decide(&e, &IdentitySnapshot::default(), &contradiction(ContradictionKind::Soft));
        assert_eq!(name, "low_arousal");
        assert_eq!(d, ToneDecision::new(T::Austere, I::Low, F::Emotion));
    }

    #[test]
    fn test_soft_contradiction() {
        let e = emotion("neutral", 0.0, 0.5, 0.2);
        let (name, d) = decide(&e, &IdentitySnapshot::default(), &contradiction(ContradictionKind::Soft));
        assert_eq!(name, "soft_contradiction");
        assert_eq!(d, ToneDecision::new(T::Soft, I::Medium, F::Paradox));
    }

    #[test]
    fn test_default() {
        let e = EmotionAnalysis::default();
        let d = ToneDecisionEngine::new().decide_tone(&e, &IdentitySnapshot::default(), &LogicAnalysis::default());
        assert_eq!(d, ToneDecision::new(T::Austere, I::Low, F::Story));
    }

    #[test]
    fn test_deterministic() {
        let engine = ToneDecisionEngine::new();
        let e = emotion("anger", -0.4, 0.8, 0.5);
        let s = regressed();
        let l = contradiction(ContradictionKind::Hard);
        assert_eq!(engine.decide_tone(&e, &s, &l), engine.decide_tone(&e, &s, &l));
    }

    #[test]
    fn test_empty_table_uses_fallback() {
        let engine = ToneDecisionEngine::with_rules(Vec::new());
        let d = engine.decide_tone(&EmotionAnalysis::default(), &IdentitySnapshot::default(), &LogicAnalysis::default());
        assert_eq!(d, ToneDecision::new(T::Austere, I::Low, F::Story));
    }

    #[test]
    fn test_display() {
        assert_eq!(MirrorTone::Provocative.to_string(), "provocative");
        assert_eq!(Intensity::Medium.to_string(), "medium");
        assert_eq!(Focus::Paradox.to_string(), "paradox");
    }
}
