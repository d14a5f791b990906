//! Lexical analyzer used when no external analysis service is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    AnalysisInput, Analyzer, Contradiction, ContradictionKind, EmotionAnalysis, GroundingResult,
    LogicAnalysis, SemanticAnalysis,
};
use crate::error::AnalyzerError;
use crate::identity::IdentitySnapshot;
use crate::utilities::string_utils::{
    content_tokens, normalize, phrase_hits, sentences, tokenize, STOPWORDS,
};

/// (word, emotion, valence, arousal)
const EMOTION_LEXICON: &[(&str, &str, f64, f64)] = &[
    ("hopeless", "despair", -0.9, 0.4),
    ("worthless", "despair", -0.9, 0.4),
    ("empty", "despair", -0.7, 0.2),
    ("panic", "panic", -0.8, 0.95),
    ("terrified", "panic", -0.8, 0.9),
    ("sad", "sadness", -0.6, 0.3),
    ("lonely", "sadness", -0.6, 0.3),
    ("grief", "sadness", -0.7, 0.4),
    ("cry", "sadness", -0.5, 0.5),
    ("angry", "anger", -0.6, 0.8),
    ("furious", "anger", -0.8, 0.9),
    ("frustrated", "anger", -0.5, 0.7),
    ("anxious", "fear", -0.6, 0.8),
    ("afraid", "fear", -0.6, 0.7),
    ("scared", "fear", -0.6, 0.75),
    ("worried", "fear", -0.4, 0.6),
    ("ashamed", "shame", -0.7, 0.5),
    ("guilty", "shame", -0.5, 0.5),
    ("embarrassed", "shame", -0.4, 0.6),
    ("stuck", "frustration", -0.4, 0.5),
    ("tired", "fatigue", -0.3, 0.15),
    ("exhausted", "fatigue", -0.5, 0.1),
    ("numb", "fatigue", -0.4, 0.05),
    ("confused", "confusion", -0.2, 0.5),
    ("curious", "curiosity", 0.4, 0.4),
    ("wonder", "curiosity", 0.3, 0.35),
    ("wondering", "curiosity", 0.3, 0.35),
    ("calm", "calm", 0.5, 0.15),
    ("peaceful", "calm", 0.6, 0.15),
    ("grateful", "gratitude", 0.7, 0.35),
    ("thankful", "gratitude", 0.7, 0.35),
    ("happy", "joy", 0.8, 0.6),
    ("excited", "joy", 0.7, 0.85),
    ("proud", "joy", 0.6, 0.55),
    ("hopeful", "hope", 0.6, 0.45),
];

const INTENSIFIERS: &[&str] = &["so", "very", "really", "extremely", "completely", "totally"];

const NEGATORS: &[&str] = &["not", "never", "don't", "no", "can't", "won't", "isn't", "didn't"];

/// Clause openers that state a belief.
const STATED_BELIEF_OPENERS: &[&str] = &[
    "i believe", "i think", "i am", "i'm", "i should", "i need to", "i value", "i care about",
];

/// Clause openers that imply one.
const IMPLIED_BELIEF_OPENERS: &[&str] = &["i have to", "i must", "i can't", "i always", "i never"];

const STORY_OPENERS: &[&str] = &["i always", "i never", "i'm the kind of", "i'm the type of", "ever since"];

const HIDDEN_QUESTION_OPENERS: &[&str] = &["why do i", "what if", "why can't i", "what does it mean"];

const FACTUAL_CUES: &[&str] = &["is it true", "how many", "what is the", "statistics", "research says"];

static CONTRAST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s+\b(but|yet)\b\s+").unwrap());
static BOTH_AND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bboth\b.+\band\b").unwrap());
static EITHER_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+\bor\b\s+").unwrap());
static CLAUSE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),|;|\s+\b(but|yet|and)\b\s+").unwrap());

/// Word-list analyzer. Deterministic; never fails.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn emotion(&self, text: &str) -> EmotionAnalysis {
        let tokens = tokenize(text);
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let (mut valence, mut arousal, mut hits) = (0.0, 0.0, 0usize);

        for (i, token) in tokens.iter().enumerate() {
            let Some(&(_, emotion, v, a)) = EMOTION_LEXICON.iter().find(|(w, ..)| *w == token.as_str()) else {
                continue;
            };
            // "not happy" counts as mildly negative, not as joy.
            let negated = i > 0 && NEGATORS.contains(&tokens[i - 1].as_str());
            let v = if negated { -v.abs() * 0.5 } else { v };
            valence += v;
            arousal += a;
            hits += 1;
            if negated {
                continue;
            }
            match counts.iter_mut().find(|(e, _)| *e == emotion) {
                Some((_, n)) => *n += 1,
                None => counts.push((emotion, 1)),
            }
        }

        if hits == 0 {
            return EmotionAnalysis::default();
        }

        // Stable sort keeps first-mentioned emotions ahead on ties.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let boost = tokens
            .iter()
            .filter(|t| INTENSIFIERS.contains(&t.as_str()))
            .count() as f64
            * 0.15;

        EmotionAnalysis {
            primary: counts.first().map_or("ambivalence", |(e, _)| *e).to_string(),
            secondary: counts.get(1).map(|(e, _)| e.to_string()),
            valence: (valence / hits as f64).clamp(-1.0, 1.0),
            arousal: (arousal / hits as f64).clamp(0.0, 1.0),
            intensity: (0.3 + 0.2 * hits as f64 + boost).min(1.0),
        }
    }

    pub fn semantic(&self, text: &str) -> SemanticAnalysis {
        let sentences = sentences(text);

        let mut frequency: HashMap<String, usize> = HashMap::new();
        for token in tokenize(text) {
            if token.len() > 3 && !STOPWORDS.contains(&token.as_str()) {
                *frequency.entry(token).or_default() += 1;
            }
        }
        let mut topics: Vec<(String, usize)> = frequency.into_iter().collect();
        topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let core_question = sentences.iter().find(|s| s.ends_with('?')).cloned();
        let hidden_questions = sentences
            .iter()
            .filter(|s| starts_with_any(s, HIDDEN_QUESTION_OPENERS))
            .cloned()
            .collect();

        SemanticAnalysis {
            topics: topics.into_iter().take(3).map(|(t, _)| t).collect(),
            core_question,
            hidden_questions,
            beliefs_stated: clauses_after(&sentences, STATED_BELIEF_OPENERS),
            beliefs_implied: clauses_after(&sentences, IMPLIED_BELIEF_OPENERS),
            self_stories: sentences
                .iter()
                .filter(|s| starts_with_any(s, STORY_OPENERS))
                .cloned()
                .collect(),
        }
    }

    pub fn logic(&self, text: &str, semantic: &SemanticAnalysis) -> LogicAnalysis {
        let sentences = sentences(text);
        let mut logic = LogicAnalysis {
            claims: semantic.beliefs_stated.clone(),
            implied_claims: semantic.beliefs_implied.clone(),
            ..LogicAnalysis::default()
        };

        for sentence in &sentences {
            let parts: Vec<&str> = CONTRAST.split(sentence).map(str::trim).collect();
            for pair in parts.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a.is_empty() || b.is_empty() {
                    continue;
                }
                logic.contradictions.push(Contradiction {
                    claim_a: a.to_string(),
                    claim_b: b.to_string(),
                    kind: contradiction_kind(a, b),
                });
            }
            if BOTH_AND.is_match(sentence) {
                logic.paradoxes.push(sentence.clone());
            }
            let options: Vec<&str> = EITHER_OR.split(sentence).map(str::trim).collect();
            if options.len() > 1 {
                logic.possible_paths.extend(options.iter().map(|o| o.to_string()));
            }
        }
        logic
    }

    fn grounding(&self, text: &str) -> GroundingResult {
        let tokens = tokenize(text);
        GroundingResult {
            needed: FACTUAL_CUES.iter().any(|c| phrase_hits(&tokens, c) > 0),
            ..GroundingResult::default()
        }
    }
}

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        _snapshot: &IdentitySnapshot,
    ) -> Result<AnalysisInput, AnalyzerError> {
        let semantic = self.semantic(text);
        let logic = self.logic(text, &semantic);
        Ok(AnalysisInput {
            emotion: self.emotion(text),
            grounding: self.grounding(text),
            semantic,
            logic,
        })
    }
}

fn starts_with_any(sentence: &str, openers: &[&str]) -> bool {
    let tokens = tokenize(sentence);
    openers.iter().any(|o| {
        let needle = tokenize(o);
        tokens.len() >= needle.len() && tokens[..needle.len()] == needle[..]
    })
}

/// Clauses that begin with one of `openers`, cut at the next clause break.
fn clauses_after(sentences: &[String], openers: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sentence in sentences {
        let lowered = normalize(sentence);
        for opener in openers {
            let mut from = 0;
            while let Some(pos) = lowered[from..].find(opener) {
                let start = from + pos;
                from = start + opener.len();
                let is_word_char = |c: char| c.is_alphanumeric() || c == '\'';
                let bounded = !lowered[..start].ends_with(is_word_char)
                    && !lowered[from..].starts_with(is_word_char);
                if !bounded {
                    continue;
                }
                let rest = &lowered[start..];
                let end = CLAUSE_END.find(rest).map_or(rest.len(), |m| m.start());
                let clause = rest[..end].trim_end_matches('?').trim().to_string();
                if tokenize(&clause).len() > tokenize(opener).len() && !out.contains(&clause) {
                    out.push(clause);
                }
            }
        }
    }
    out
}

/// One side negating a claim the other makes is hard; anything else is soft.
fn contradiction_kind(a: &str, b: &str) -> ContradictionKind {
    let negated = |s: &str| tokenize(s).iter().any(|t| NEGATORS.contains(&t.as_str()));
    let shared = !content_tokens(a).is_disjoint(&content_tokens(b));
    if negated(a) != negated(b) && shared {
        ContradictionKind::Hard
    } else {
        ContradictionKind::Soft
    }
}
