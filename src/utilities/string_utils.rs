//! Text utilities shared by the analyzers, detectors and linter.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_\-]*)\}").unwrap());
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").unwrap());
static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?\n]+").unwrap());

/// Words ignored when comparing labels by content.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "the", "i", "i'm", "im", "am", "is", "are", "be", "to", "of", "and", "or", "in",
    "on", "at", "my", "me", "it", "that", "this", "for", "with", "so", "just", "really",
];

/// Lowercase `text` and fold typographic apostrophes to `'`.
pub fn normalize(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'").to_lowercase()
}

/// Lowercase word tokens, in order. Apostrophes stay inside words.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = normalize(text);
    WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Distinct lowercase tokens.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Tokens with stopwords removed.
pub fn content_tokens(text: &str) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

pub fn word_count(text: &str) -> usize {
    tokenize(text).len()
}

/// Jaccard similarity `|A∩B| / |A∪B|`. An empty union has no similarity.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Count occurrences of `phrase` as a whole-word token sequence in `tokens`.
pub fn phrase_hits(tokens: &[String], phrase: &str) -> usize {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return 0;
    }
    tokens
        .windows(needle.len())
        .filter(|window| window.iter().zip(&needle).all(|(a, b)| a == b))
        .count()
}

/// Markers from `markers` that occur in `tokens`, each listed once.
pub fn matched_markers(tokens: &[String], markers: &[&str]) -> Vec<String> {
    markers
        .iter()
        .filter(|m| phrase_hits(tokens, m) > 0)
        .map(|m| m.to_string())
        .collect()
}

/// Total occurrences of all markers in `tokens`.
pub fn marker_count(tokens: &[String], markers: &[&str]) -> usize {
    markers.iter().map(|m| phrase_hits(tokens, m)).sum()
}

/// Split text into trimmed, non-empty sentences. Question marks are kept
/// so callers can tell questions apart.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        let sentence = text[last..m.start()].trim();
        if !sentence.is_empty() {
            let terminator = if m.as_str().contains('?') { "?" } else { "" };
            out.push(format!("{}{}", sentence, terminator));
        }
        last = m.end();
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Truncate on a character boundary, appending an ellipsis when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

/// Interpolate `{key}` placeholders while leaving JSON braces untouched.
///
/// # Errors
/// Returns an error naming the first placeholder missing from `inputs`.
pub fn interpolate_only(input: &str, inputs: &HashMap<&str, String>) -> Result<String, String> {
    if !input.contains('{') {
        return Ok(input.to_string());
    }

    let variables: Vec<String> = VARIABLE_PATTERN
        .captures_iter(input)
        .map(|cap| cap[1].to_string())
        .collect();

    if let Some(missing) = variables.iter().find(|v| !inputs.contains_key(v.as_str())) {
        return Err(format!("Template variable '{}' not found in inputs", missing));
    }

    // One pass, so substituted values are never scanned for placeholders.
    let result = VARIABLE_PATTERN.replace_all(input, |cap: &regex::Captures<'_>| {
        inputs
            .get(&cap[1])
            .cloned()
            .unwrap_or_else(|| cap[0].to_string())
    });
    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_contractions() {
        assert_eq!(tokenize("I'm stuck, AGAIN!"), vec!["i'm", "stuck", "again"]);
    }

    #[test]
    fn test_tokenize_folds_typographic_apostrophe() {
        assert_eq!(tokenize("I\u{2019}m a failure"), vec!["i'm", "a", "failure"]);
        assert_eq!(tokenize("Je suis fatigu\u{e9}e"), vec!["je", "suis", "fatigu\u{e9}e"]);
        let tokens = tokenize("I don\u{2019}t want to talk");
        assert_eq!(phrase_hits(&tokens, "don't want to talk"), 1);
    }

    #[test]
    fn test_jaccard_identical_sets() {
        let a = token_set("I feel stuck at work");
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_jaccard_empty_union_is_zero() {
        let empty = HashSet::new();
        assert_eq!(jaccard_similarity(&empty, &empty), 0.0);
    }

    #[test]
    fn test_phrase_hits_whole_words_only() {
        let tokens = tokenize("I define myself. It's fine, fine.");
        assert_eq!(phrase_hits(&tokens, "fine"), 2);
        assert_eq!(phrase_hits(&tokens, "i define"), 1);
        assert_eq!(phrase_hits(&tokens, "myself it's"), 1);
    }

    #[test]
    fn test_sentences_marks_questions() {
        let parts = sentences("I am tired. Why do I do this? Anyway");
        assert_eq!(parts, vec!["I am tired", "Why do I do this?", "Anyway"]);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("a longer sentence", 8), "a longer…");
    }

    #[test]
    fn test_interpolate_only_basic() {
        let mut inputs = HashMap::new();
        inputs.insert("name", "Alice".to_string());
        let result = interpolate_only("Hello {name}! {\"json\": 1}", &inputs).unwrap();
        assert_eq!(result, "Hello Alice! {\"json\": 1}");
    }

    #[test]
    fn test_interpolate_only_leaves_placeholders_in_values() {
        let mut inputs = HashMap::new();
        inputs.insert("reflection", "I wrote {tone} and {plan} here".to_string());
        inputs.insert("tone", "gentle".to_string());
        inputs.insert("plan", "{}".to_string());
        let result = interpolate_only("{reflection} / {tone} / {plan}", &inputs).unwrap();
        assert_eq!(result, "I wrote {tone} and {plan} here / gentle / {}");
    }

    #[test]
    fn test_interpolate_only_missing_var() {
        let inputs = HashMap::new();
        assert!(interpolate_only("Hello {name}!", &inputs).is_err());
    }
}
