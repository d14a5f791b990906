//! Stateless regression detectors over single reflections.

use super::markers::{
    RegressionKind, RegressionMarker, AVOIDANCE_MARKERS, HARSH_SELF_MARKERS, JUDGMENT_MARKERS,
    MILD_SELF_MARKERS, MODERATE_SELF_MARKERS,
};
use super::tracker::HistoryEntry;
use crate::utilities::string_utils::{
    jaccard_similarity, marker_count, matched_markers, token_set, tokenize,
};

/// Default Jaccard threshold for a lexical loop.
pub const DEFAULT_LOOP_THRESHOLD: f64 = 0.7;

/// Default number of past reflections a new one is compared against.
pub const DEFAULT_LOOP_WINDOW: usize = 5;

/// Tiered self-attack detection.
///
/// Severity follows the highest tier present (harsh 5, moderate 3, mild 2);
/// lower-tier hits never add to it.
pub fn detect_self_attack(text: &str) -> Option<RegressionMarker> {
    let tokens = tokenize(text);
    let tiers: [(&[&str], u8, &str); 3] = [
        (HARSH_SELF_MARKERS, 5, "harsh self-directed language"),
        (MODERATE_SELF_MARKERS, 3, "self-critical language"),
        (MILD_SELF_MARKERS, 2, "mild self-criticism"),
    ];

    let mut evidence = Vec::new();
    let mut verdict = None;
    for (markers, severity, description) in tiers {
        let hits = matched_markers(&tokens, markers);
        if !hits.is_empty() && verdict.is_none() {
            verdict = Some((severity, description));
        }
        evidence.extend(hits);
    }

    let (severity, description) = verdict?;
    Some(RegressionMarker::new(RegressionKind::SelfAttack, severity, description).with_evidence(evidence))
}

/// Outward judgment: severity `min(5, 2·m)` for `m` marker occurrences.
pub fn detect_judgment_spike(text: &str) -> Option<RegressionMarker> {
    let tokens = tokenize(text);
    let m = marker_count(&tokens, JUDGMENT_MARKERS);
    if m == 0 {
        return None;
    }
    let severity = (2 * m).min(5) as u8;
    Some(
        RegressionMarker::new(
            RegressionKind::JudgmentSpike,
            severity,
            format!("{} outward judgment marker(s)", m),
        )
        .with_evidence(matched_markers(&tokens, JUDGMENT_MARKERS)),
    )
}

/// Avoidance: two or more markers give severity 3, a brief reflection with
/// any marker gives 2, a single marker otherwise gives 1.
pub fn detect_avoidance(text: &str, word_limit: usize) -> Option<RegressionMarker> {
    let tokens = tokenize(text);
    let hits = matched_markers(&tokens, AVOIDANCE_MARKERS);
    let count = marker_count(&tokens, AVOIDANCE_MARKERS);
    if count == 0 {
        return None;
    }
    let brief = tokens.len() < word_limit;
    let (severity, description) = if count >= 2 {
        (3, "repeated deflection")
    } else if brief {
        (2, "brief reflection with deflection")
    } else {
        (1, "single deflection signal")
    };
    Some(RegressionMarker::new(RegressionKind::Avoidance, severity, description).with_evidence(hits))
}

/// Compare `current` against the last `window` entries of `recent`, oldest
/// first. The first entry at or above `threshold` raises a loop marker that
/// points back to it.
pub fn detect_loop(
    current: &str,
    recent: &[HistoryEntry],
    threshold: f64,
    window: usize,
) -> Option<RegressionMarker> {
    let current_tokens = token_set(current);
    let start = recent.len().saturating_sub(window);

    recent[start..].iter().find_map(|entry| {
        let similarity = jaccard_similarity(&current_tokens, &token_set(&entry.text));
        if similarity < threshold {
            return None;
        }
        let severity = ((similarity * 5.0).round() as u8).clamp(1, 5);
        let mut marker = RegressionMarker::new(
            RegressionKind::Loop,
            severity,
            format!("repeats an earlier reflection (similarity {:.2})", similarity),
        )
        .with_evidence(vec![entry.id.to_string()]);
        marker.related_entry = Some(entry.id);
        Some(marker)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_attack_harsh_wins_over_mild() {
        let marker = detect_self_attack("I'm stupid, I messed up").unwrap();
        assert_eq!(marker.severity, 5);
        assert!(marker.evidence_markers.contains(&"stupid".to_string()));
        assert!(marker.evidence_markers.contains(&"messed up".to_string()));
    }

    #[test]
    fn test_self_attack_tiers() {
        assert_eq!(detect_self_attack("It's my fault again").unwrap().severity, 3);
        assert_eq!(detect_self_attack("I should have called").unwrap().severity, 2);
        assert!(detect_self_attack("I walked by the river").is_none());
    }

    #[test]
    fn test_typographic_apostrophes_still_match() {
        assert_eq!(detect_self_attack("I\u{2019}m a failure").unwrap().severity, 5);
        let marker = detect_avoidance("I don\u{2019}t want to talk about it", 20).unwrap();
        assert!(marker.evidence_markers.contains(&"don't want to talk".to_string()));
    }

    #[test]
    fn test_self_attack_not_additive() {
        let marker = detect_self_attack("my fault, not good enough, loser").unwrap();
        assert_eq!(marker.severity, 3);
    }

    #[test]
    fn test_judgment_spike_scales_and_caps() {
        assert_eq!(detect_judgment_spike("They never listen").unwrap().severity, 2);
        assert_eq!(
            detect_judgment_spike("They never listen. So selfish and lazy").unwrap().severity,
            5
        );
        assert!(detect_judgment_spike("We had dinner").is_none());
    }

    #[test]
    fn test_avoidance_severity() {
        assert_eq!(detect_avoidance("whatever", 20).unwrap().severity, 2);
        assert_eq!(detect_avoidance("whatever, moving on", 20).unwrap().severity, 3);
        let long = "I spent most of the day cleaning the apartment and calling my \
                    brother about the weekend plans, and honestly it doesn't matter much";
        assert_eq!(detect_avoidance(long, 20).unwrap().severity, 1);
        assert!(detect_avoidance("I went running", 20).is_none());
    }

    #[test]
    fn test_loop_detected_for_repetition() {
        let history = vec![HistoryEntry::new("I feel stuck at work again")];
        let marker = detect_loop(
            "I feel stuck at work again",
            &history,
            DEFAULT_LOOP_THRESHOLD,
            DEFAULT_LOOP_WINDOW,
        )
        .unwrap();
        assert_eq!(marker.kind, RegressionKind::Loop);
        assert_eq!(marker.related_entry, Some(history[0].id));
        assert_eq!(marker.severity, 5);
    }

    #[test]
    fn test_loop_not_detected_for_half_overlap() {
        let history = vec![HistoryEntry::new("I feel stuck at work")];
        assert!(detect_loop("I feel okay today", &history, 0.7, 5).is_none());
    }

    #[test]
    fn test_loop_respects_window() {
        let mut history = vec![HistoryEntry::new("I feel stuck at work")];
        for i in 0..5 {
            history.push(HistoryEntry::new(format!("unrelated entry number {}", i)));
        }
        assert!(detect_loop("I feel stuck at work", &history, 0.7, 5).is_none());
        assert!(detect_loop("I feel stuck at work", &history, 0.7, 6).is_some());
    }
}
