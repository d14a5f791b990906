//! Crisis keyword bypass.

use crate::config::MirrorConfig;
use crate::utilities::string_utils::{phrase_hits, tokenize};

/// Matches raw reflection text against the configured crisis phrases.
///
/// Phrases are compared as whole-word token sequences, so punctuation and
/// hyphenation in the input do not hide a match.
#[derive(Debug, Clone)]
pub struct CrisisDetector {
    keywords: Vec<String>,
    message: String,
}

impl CrisisDetector {
    pub fn new(keywords: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            message: message.into(),
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.crisis_keywords.clone(), config.crisis_message.clone())
    }

    /// The first configured phrase found in `text`.
    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        let tokens = tokenize(text);
        self.keywords
            .iter()
            .find(|k| phrase_hits(&tokens, k) > 0)
            .map(String::as_str)
    }

    pub fn is_crisis(&self, text: &str) -> bool {
        self.matched_keyword(text).is_some()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CrisisDetector {
        CrisisDetector::from_config(&MirrorConfig::default())
    }

    #[test]
    fn test_detects_keywords_case_insensitively() {
        let d = detector();
        assert_eq!(d.matched_keyword("Sometimes I want to DIE."), Some("want to die"));
        assert!(d.is_crisis("thinking about self-harm again"));
        assert!(d.is_crisis("I've been having suicidal thoughts"));
    }

    #[test]
    fn test_ignores_partial_words() {
        let d = detector();
        assert!(!d.is_crisis("the diet is killing my mood"));
        assert!(!d.is_crisis("I want to dive into this project"));
    }

    #[test]
    fn test_blank_keywords_dropped() {
        let d = CrisisDetector::new(vec!["  ".into()], "help");
        assert!(!d.is_crisis("anything"));
        assert_eq!(d.message(), "help");
    }
}
