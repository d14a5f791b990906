//! Growth trajectories over a user's reflection history.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::markers::{CONFUSION_MARKERS, INSIGHT_MARKERS, PATTERN_RECOGNITION_MARKERS};
use super::tracker::HistoryEntry;
use crate::config::GrowthParams;
use crate::utilities::string_utils::{marker_count, tokenize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    /// Least-squares slope of insight density over reflection index, weighted.
    /// Positive when insight language is becoming more frequent.
    pub self_awareness_trend: f64,
    /// Weighted share of reflections that name a pattern.
    pub pattern_recognition: f64,
    /// Distinct primary emotions seen.
    pub emotional_range: usize,
    pub reflection_count: usize,
}

/// A move from confusion to insight within a short span of reflections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakthrough {
    pub from_entry: Uuid,
    pub to_entry: Uuid,
    pub description: String,
}

fn insight_density(text: &str) -> f64 {
    let tokens = tokenize(text);
    marker_count(&tokens, INSIGHT_MARKERS) as f64 / tokens.len().max(1) as f64
}

fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

pub fn calculate_growth_metrics(history: &[HistoryEntry], params: &GrowthParams) -> GrowthMetrics {
    let densities: Vec<f64> = history.iter().map(|e| insight_density(&e.text)).collect();

    let recognizing = history
        .iter()
        .filter(|e| marker_count(&tokenize(&e.text), PATTERN_RECOGNITION_MARKERS) > 0)
        .count();
    let pattern_recognition = if history.is_empty() {
        0.0
    } else {
        recognizing as f64 / history.len() as f64 * params.recognition_weight
    };

    let emotions: HashSet<&str> = history
        .iter()
        .filter_map(|e| e.primary_emotion.as_deref())
        .collect();

    GrowthMetrics {
        self_awareness_trend: slope(&densities) * params.insight_weight,
        pattern_recognition,
        emotional_range: emotions.len(),
        reflection_count: history.len(),
    }
}

fn marker_balance(text: &str) -> (usize, usize) {
    let tokens = tokenize(text);
    (
        marker_count(&tokens, CONFUSION_MARKERS),
        marker_count(&tokens, INSIGHT_MARKERS),
    )
}

/// Confusion-dominated reflections followed, within `window` entries, by an
/// insight-dominated one. Each insight reflection is reported at most once.
pub fn identify_breakthroughs(history: &[HistoryEntry], window: usize) -> Vec<Breakthrough> {
    let balances: Vec<(usize, usize)> = history.iter().map(|e| marker_balance(&e.text)).collect();
    let mut claimed = HashSet::new();
    let mut found = Vec::new();

    for (i, &(confusion, insight)) in balances.iter().enumerate() {
        if confusion == 0 || confusion <= insight {
            continue;
        }
        let end = (i + window).min(history.len());
        let hit = (i + 1..end).find(|&j| {
            let (c, s) = balances[j];
            s > 0 && s > c && !claimed.contains(&j)
        });
        if let Some(j) = hit {
            claimed.insert(j);
            found.push(Breakthrough {
                from_entry: history[i].id,
                to_entry: history[j].id,
                description: format!(
                    "confusion in reflection {} gave way to insight in reflection {}",
                    i + 1,
                    j + 1
                ),
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(texts: &[&str]) -> Vec<HistoryEntry> {
        texts.iter().map(|t| HistoryEntry::new(*t)).collect()
    }

    #[test]
    fn test_trend_positive_when_insight_grows() {
        let h = history(&[
            "work was long and tiring",
            "I notice I get quiet when tired",
            "I realize I notice the pattern now, it makes sense",
        ]);
        let metrics = calculate_growth_metrics(&h, &GrowthParams::default());
        assert!(metrics.self_awareness_trend > 0.0);
        assert_eq!(metrics.reflection_count, 3);
        assert!((metrics.pattern_recognition - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_zero_for_single_entry() {
        let h = history(&["I realize a lot today"]);
        assert_eq!(calculate_growth_metrics(&h, &GrowthParams::default()).self_awareness_trend, 0.0);
    }

    #[test]
    fn test_emotional_range_counts_distinct() {
        let mut h = history(&["a", "b", "c"]);
        h[0].primary_emotion = Some("sadness".into());
        h[1].primary_emotion = Some("sadness".into());
        h[2].primary_emotion = Some("joy".into());
        assert_eq!(calculate_growth_metrics(&h, &GrowthParams::default()).emotional_range, 2);
    }

    #[test]
    fn test_breakthrough_within_window() {
        let h = history(&[
            "I don't know why I keep doing this, I'm confused",
            "went to work",
            "I realize it's because I fear being alone",
        ]);
        let found = identify_breakthroughs(&h, 3);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].from_entry, h[0].id);
        assert_eq!(found[0].to_entry, h[2].id);
    }

    #[test]
    fn test_no_breakthrough_outside_window() {
        let h = history(&[
            "I'm so confused",
            "went to work",
            "cooked dinner",
            "I realize what I want",
        ]);
        assert!(identify_breakthroughs(&h, 3).is_empty());
    }
}
