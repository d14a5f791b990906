//! Regression markers, loop records and the keyword lexicons behind them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionKind {
    Loop,
    SelfAttack,
    JudgmentSpike,
    Avoidance,
}

/// A recorded instance of regression. Append-only: never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMarker {
    pub kind: RegressionKind,
    /// 1 (mild) to 5 (severe).
    pub severity: u8,
    pub description: String,
    pub evidence_markers: Vec<String>,
    /// Reflection that raised the marker.
    #[serde(default)]
    pub entry_id: Option<Uuid>,
    /// Earlier reflection a loop marker points back to.
    #[serde(default)]
    pub related_entry: Option<Uuid>,
    pub detected_at: DateTime<Utc>,
}

impl RegressionMarker {
    pub fn new(kind: RegressionKind, severity: u8, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: severity.clamp(1, 5),
            description: description.into(),
            evidence_markers: Vec::new(),
            entry_id: None,
            related_entry: None,
            detected_at: Utc::now(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence_markers = evidence;
        self
    }
}

/// A recurring lexical pattern across reflections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    /// Id of the earliest reflection in the pattern.
    pub pattern_id: Uuid,
    pub occurrences: u32,
    pub strength: f64,
    pub broken: bool,
    /// Reflections that belong to the pattern, oldest first.
    pub entry_ids: Vec<Uuid>,
    /// History index of the last reinforcing reflection.
    pub last_seen: usize,
}

impl Loop {
    pub fn is_active(&self) -> bool {
        !self.broken && self.occurrences >= 1
    }
}

/// Severe self-directed language. Any hit forces severity 5.
pub const HARSH_SELF_MARKERS: &[&str] = &[
    "stupid", "worthless", "hate myself", "pathetic", "idiot", "disgusting", "useless",
    "i'm a failure", "i am a failure",
];

/// Severity 3 when no harsh marker is present.
pub const MODERATE_SELF_MARKERS: &[&str] = &[
    "not good enough", "always mess up", "can't do anything right", "my fault", "loser",
    "so weak", "ashamed of myself",
];

/// Severity 2 when neither tier above matched.
pub const MILD_SELF_MARKERS: &[&str] = &[
    "messed up", "should have", "not great at", "disappointed in myself",
    "could have done better", "my bad",
];

/// Outward-directed judgment.
pub const JUDGMENT_MARKERS: &[&str] = &[
    "they always", "they never", "idiots", "selfish", "lazy", "ridiculous", "everyone is",
    "people are", "can't stand", "so dumb",
];

pub const AVOIDANCE_MARKERS: &[&str] = &[
    "whatever", "doesn't matter", "don't want to talk", "don't want to think", "fine",
    "never mind", "moving on", "not a big deal", "rather not", "i guess",
];

/// Self-referential insight language.
pub const INSIGHT_MARKERS: &[&str] = &[
    "i realize", "i realized", "i notice", "i see now", "i understand", "i learned",
    "makes sense", "i'm starting to", "i recognize", "now i know", "it clicked",
];

pub const CONFUSION_MARKERS: &[&str] = &[
    "i don't know", "confused", "don't understand", "no idea", "why do i", "can't figure",
    "lost", "makes no sense",
];

pub const PATTERN_RECOGNITION_MARKERS: &[&str] = &[
    "i notice", "again", "pattern", "always do", "keep doing", "every time",
];
