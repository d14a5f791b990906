//! The guardrail rule table and its deterministic repairs.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::utilities::string_utils::{phrase_hits, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
}

/// One row of the lint table: how to find offending phrases and how to
/// rewrite text without them.
#[derive(Clone, Copy)]
pub struct GuardrailRule {
    pub name: &'static str,
    pub reason: &'static str,
    pub severity: ViolationSeverity,
    /// Offending phrases found in the text, in order of appearance.
    pub detect: fn(&str) -> Vec<String>,
    pub repair: fn(&str) -> String,
}

impl std::fmt::Debug for GuardrailRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Appended when a repaired reply has no question.
pub const CLOSING_QUESTION: &str = "What do you notice as you read this back?";

static ADVICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:you shouldn['’]t|you should|you need to|you must|you have to|you ought to|you['’]d better|i suggest|i recommend|my advice is|make sure you)\b",
    )
    .unwrap()
});

static STEPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\bstep\s+\d+\s*[:.)-]?\s*|\b(?:first|second|third|next|finally),\s*|\bhere(?:['’]s| is) what (?:to|you can) do:?\s*)",
    )
    .unwrap()
});

static RESOLUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:the answer is|the solution is|just let go|you just need to|all you need is|problem solved|you['’]ll be fine|everything will be (?:fine|okay|ok)|the real issue is|simply)\b",
    )
    .unwrap()
});

static JUDGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:you['’]re wrong|that['’]s wrong|that was wrong|you['’]re being (?:irrational|dramatic|selfish|lazy)|you['’]re overreacting|that['’]s (?:silly|stupid|ridiculous)|shame on you|you always|you never)\b",
    )
    .unwrap()
});

static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.!?;:])").unwrap());

const ADVICE_REWRITES: &[(&str, &str)] = &[
    ("you shouldn't", "you might not"),
    ("you should", "you might"),
    ("you need to", "you might"),
    ("you must", "you might"),
    ("you have to", "you might"),
    ("you ought to", "you might"),
    ("you'd better", "you might"),
    ("i suggest", "I wonder if"),
    ("i recommend", "I wonder about"),
    ("my advice is", "one thought is"),
    ("make sure you", "you might"),
];

const RESOLUTION_REWRITES: &[(&str, &str)] = &[
    ("the answer is", "one possibility is"),
    ("the solution is", "one possibility is"),
    ("just let go", "notice what letting go would ask of you"),
    ("you just need to", "you might"),
    ("all you need is", "something that might matter is"),
    ("the real issue is", "part of this may be"),
    ("problem solved", ""),
    ("you'll be fine", ""),
    ("everything will be", ""),
    ("simply", ""),
];

/// Words that make a reply reflective even without a question mark.
const REFLECTIVE_VOCABULARY: &[&str] = &[
    "notice", "noticing", "wonder", "wondering", "curious", "sounds like", "seems like", "i hear",
    "what comes up",
];

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().trim().to_string()).collect()
}

/// Keep the capitalization of the first letter of `original`.
fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if starts_upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_string(),
    }
}

fn rewrite(re: &Regex, table: &[(&str, &str)], text: &str) -> String {
    re.replace_all(text, |caps: &Captures<'_>| {
        let found = &caps[0];
        let lowered = found.to_lowercase();
        table
            .iter()
            .find(|(from, _)| lowered.starts_with(from))
            .map_or_else(String::new, |(_, to)| match_case(found, to))
    })
    .into_owned()
}

/// Collapse leftover whitespace and re-capitalize sentence starts.
pub fn tidy(text: &str) -> String {
    let text = SPACES.replace_all(text.trim(), " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let mut out = String::with_capacity(text.len());
    let mut at_start = true;
    for c in text.chars() {
        if at_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_start = false;
        } else {
            out.push(c);
            if matches!(c, '.' | '!' | '?') {
                at_start = true;
            } else if !c.is_whitespace() && !matches!(c, '"' | '\'' | ',') {
                at_start = false;
            }
        }
    }
    out
}

pub fn is_reflective(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    let tokens = tokenize(text);
    REFLECTIVE_VOCABULARY.iter().any(|w| phrase_hits(&tokens, w) > 0)
}

/// Append [`CLOSING_QUESTION`] unless the text already asks something.
pub fn ensure_question(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.contains('?') {
        return trimmed.to_string();
    }
    if trimmed.is_empty() {
        return CLOSING_QUESTION.to_string();
    }
    let sep = if trimmed.ends_with(|c: char| c == '.' || c == '!') { " " } else { ". " };
    format!("{}{}{}", trimmed, sep, CLOSING_QUESTION)
}

/// The lint table, in evaluation and repair order.
pub const DEFAULT_RULES: &[GuardrailRule] = &[
    GuardrailRule {
        name: "prescriptive_steps",
        reason: "enumerates steps for the writer to follow",
        severity: ViolationSeverity::Medium,
        detect: |t| find_all(&STEPS, t),
        repair: |t| STEPS.replace_all(t, "").into_owned(),
    },
    GuardrailRule {
        name: "advice",
        reason: "tells the writer what to do",
        severity: ViolationSeverity::High,
        detect: |t| find_all(&ADVICE, t),
        repair: |t| rewrite(&ADVICE, ADVICE_REWRITES, t),
    },
    GuardrailRule {
        name: "resolution",
        reason: "resolves a tension on the writer's behalf",
        severity: ViolationSeverity::Medium,
        detect: |t| find_all(&RESOLUTION, t),
        repair: |t| rewrite(&RESOLUTION, RESOLUTION_REWRITES, t),
    },
    GuardrailRule {
        name: "judgment",
        reason: "judges the writer or others",
        severity: ViolationSeverity::High,
        detect: |t| find_all(&JUDGMENT, t),
        repair: |t| {
            SENTENCE
                .find_iter(t)
                .map(|m| m.as_str())
                .filter(|s| !JUDGMENT.is_match(s))
                .collect::<Vec<_>>()
                .join("")
        },
    },
    GuardrailRule {
        name: "missing_reflection",
        reason: "contains no question or reflective observation",
        severity: ViolationSeverity::Low,
        detect: |t| {
            if is_reflective(t) {
                Vec::new()
            } else {
                vec!["no question mark or reflective vocabulary".to_string()]
            }
        },
        repair: ensure_question,
    },
];
