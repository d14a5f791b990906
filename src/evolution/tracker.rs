//! Per-user reflection history and the regression/loop state derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::detectors::{detect_avoidance, detect_judgment_spike, detect_loop, detect_self_attack};
use super::growth::{self, Breakthrough, GrowthMetrics};
use super::markers::{Loop, RegressionKind, RegressionMarker};
use crate::config::{GrowthParams, MirrorConfig};
use crate::identity::IdentitySnapshot;

/// Strength gained per reinforcement.
const LOOP_STRENGTH_STEP: f64 = 0.2;

/// Strength lost per reflection that does not reinforce the loop.
const LOOP_DECAY_STEP: f64 = 0.1;

/// One submitted reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub primary_emotion: Option<String>,
}

impl HistoryEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            recorded_at: Utc::now(),
            primary_emotion: None,
        }
    }
}

/// Tracker tuning, taken from [`MirrorConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub loop_threshold: f64,
    pub loop_window: usize,
    pub avoidance_word_limit: usize,
    pub breakthrough_window: usize,
    pub growth: GrowthParams,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from(&MirrorConfig::default())
    }
}

impl From<&MirrorConfig> for TrackerSettings {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            loop_threshold: config.loop_similarity_threshold,
            loop_window: config.loop_window,
            avoidance_word_limit: config.avoidance_word_limit,
            breakthrough_window: config.breakthrough_window,
            growth: config.growth,
        }
    }
}

/// What one observed reflection produced.
#[derive(Debug, Clone)]
pub struct Observation {
    pub entry_id: Uuid,
    pub markers: Vec<RegressionMarker>,
}

/// Append-only history of one user's reflections.
///
/// Settings are not persisted; the owner sets them from the current config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternTracker {
    history: Vec<HistoryEntry>,
    markers: Vec<RegressionMarker>,
    loops: Vec<Loop>,
    #[serde(skip)]
    settings: TrackerSettings,
}

impl PatternTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: TrackerSettings) {
        self.settings = settings;
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Every marker ever raised, oldest first.
    pub fn regression_markers(&self) -> &[RegressionMarker] {
        &self.markers
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    /// Markers raised by the most recent reflection.
    pub fn active_regressions(&self) -> Vec<RegressionMarker> {
        let Some(last) = self.history.last() else {
            return Vec::new();
        };
        self.markers
            .iter()
            .filter(|m| m.entry_id == Some(last.id))
            .cloned()
            .collect()
    }

    /// Run every detector on a new reflection, update the loop registry and
    /// append the reflection to history.
    pub fn observe(&mut self, text: &str, primary_emotion: Option<&str>) -> Observation {
        let mut entry = HistoryEntry::new(text);
        entry.primary_emotion = primary_emotion.map(str::to_string);
        let index = self.history.len();

        let mut markers = Vec::new();
        if let Some(marker) = detect_loop(
            text,
            &self.history,
            self.settings.loop_threshold,
            self.settings.loop_window,
        ) {
            if let Some(related) = marker.related_entry {
                self.reinforce_loop(related, entry.id, index);
            }
            markers.push(marker);
        }
        markers.extend(detect_self_attack(text));
        markers.extend(detect_judgment_spike(text));
        markers.extend(detect_avoidance(text, self.settings.avoidance_word_limit));

        self.age_loops(index);

        for marker in &mut markers {
            marker.entry_id = Some(entry.id);
        }
        if !markers.is_empty() {
            log::debug!(
                "reflection {} raised {} regression marker(s)",
                entry.id,
                markers.len()
            );
        }
        self.markers.extend(markers.iter().cloned());
        let entry_id = entry.id;
        self.history.push(entry);

        Observation { entry_id, markers }
    }

    fn reinforce_loop(&mut self, related: Uuid, current: Uuid, index: usize) {
        if let Some(existing) = self
            .loops
            .iter_mut()
            .find(|l| !l.broken && l.entry_ids.contains(&related))
        {
            existing.occurrences += 1;
            existing.strength = (existing.occurrences as f64 * LOOP_STRENGTH_STEP).min(1.0);
            existing.entry_ids.push(current);
            existing.last_seen = index;
            return;
        }
        // A broken loop keeps its id; a recurrence starts a fresh pattern.
        let pattern_id = if self.loops.iter().any(|l| l.pattern_id == related) {
            current
        } else {
            related
        };
        self.loops.push(Loop {
            pattern_id,
            occurrences: 1,
            strength: LOOP_STRENGTH_STEP,
            broken: false,
            entry_ids: vec![related, current],
            last_seen: index,
        });
    }

    /// Decay loops not reinforced by reflection `index`; break those idle for
    /// longer than the loop window.
    fn age_loops(&mut self, index: usize) {
        let window = self.settings.loop_window;
        for l in self.loops.iter_mut().filter(|l| !l.broken && l.last_seen < index) {
            l.strength = (l.strength - LOOP_DECAY_STEP).max(0.0);
            if index - l.last_seen > window {
                l.broken = true;
                log::debug!("loop {} marked broken", l.pattern_id);
            }
        }
    }

    pub fn calculate_growth_metrics(&self) -> GrowthMetrics {
        growth::calculate_growth_metrics(&self.history, &self.settings.growth)
    }

    pub fn identify_breakthroughs(&self) -> Vec<Breakthrough> {
        growth::identify_breakthroughs(&self.history, self.settings.breakthrough_window)
    }

    /// Fill the tracker half of a snapshot.
    pub fn annotate(&self, snapshot: &mut IdentitySnapshot) {
        snapshot.loops = self.loops.clone();
        snapshot.regressions = self.active_regressions();

        let metrics = self.calculate_growth_metrics();
        let mut signals = Vec::new();
        if metrics.self_awareness_trend > 0.0 {
            signals.push("self_awareness_rising".to_string());
        }
        if metrics.pattern_recognition > 0.3 {
            signals.push("pattern_recognition".to_string());
        }
        if !self.identify_breakthroughs().is_empty() {
            signals.push("breakthrough".to_string());
        }
        if self
            .loops
            .iter()
            .any(|l| l.broken && l.occurrences >= 2)
        {
            signals.push("loop_broken".to_string());
        }
        snapshot.growth_signals = signals;
    }

    /// Number of markers of one kind in the full history.
    pub fn count_of(&self, kind: RegressionKind) -> usize {
        self.markers.iter().filter(|m| m.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_appends_history_and_markers() {
        let mut tracker = PatternTracker::default();
        let obs = tracker.observe("I'm so stupid, whatever", Some("shame"));
        assert_eq!(tracker.history().len(), 1);
        assert_eq!(obs.markers.len(), 2);
        assert!(obs.markers.iter().all(|m| m.entry_id == Some(obs.entry_id)));
        assert_eq!(tracker.count_of(RegressionKind::SelfAttack), 1);
        assert_eq!(tracker.count_of(RegressionKind::Avoidance), 1);
        assert_eq!(tracker.history()[0].primary_emotion.as_deref(), Some("shame"));
    }

    #[test]
    fn test_active_regressions_only_cover_latest_entry() {
        let mut tracker = PatternTracker::default();
        tracker.observe("I hate myself today", None);
        assert_eq!(tracker.active_regressions().len(), 1);
        tracker.observe("I walked to the park and watched the ducks for an hour", None);
        assert!(tracker.active_regressions().is_empty());
        assert_eq!(tracker.regression_markers().len(), 1);
    }

    #[test]
    fn test_loop_created_then_reinforced() {
        let mut tracker = PatternTracker::default();
        tracker.observe("I feel stuck at work again today", None);
        tracker.observe("I feel stuck at work again today", None);
        assert_eq!(tracker.loops().len(), 1);
        assert_eq!(tracker.loops()[0].occurrences, 1);

        tracker.observe("I feel stuck at work again today", None);
        assert_eq!(tracker.loops().len(), 1);
        let l = &tracker.loops()[0];
        assert_eq!(l.occurrences, 2);
        assert_eq!(l.entry_ids.len(), 3);
        assert!(l.is_active());
    }

    #[test]
    fn test_loop_breaks_after_window() {
        let settings = TrackerSettings {
            loop_window: 2,
            ..TrackerSettings::default()
        };
        let mut tracker = PatternTracker::new(settings);
        tracker.observe("I feel stuck at work again today", None);
        tracker.observe("I feel stuck at work again today", None);
        for text in ["the garden is blooming", "my cat sleeps a lot", "rain all week"] {
            tracker.observe(text, None);
        }
        let l = &tracker.loops()[0];
        assert!(l.broken);
        assert!(l.strength < LOOP_STRENGTH_STEP);
    }

    #[test]
    fn test_annotate_fills_snapshot() {
        let mut tracker = PatternTracker::default();
        tracker.observe("They never listen, so selfish", None);
        let mut snapshot = IdentitySnapshot::default();
        tracker.annotate(&mut snapshot);
        assert!(snapshot.has_active_regression());
        assert_eq!(snapshot.regressions[0].kind, RegressionKind::JudgmentSpike);
    }

    #[test]
    fn test_settings_are_not_serialized() {
        let mut tracker = PatternTracker::new(TrackerSettings {
            loop_window: 2,
            ..TrackerSettings::default()
        });
        tracker.observe("I feel stuck at work again today", None);
        let doc = serde_json::to_value(&tracker).unwrap();
        assert!(doc.get("settings").is_none());
        let restored: PatternTracker = serde_json::from_value(doc).unwrap();
        assert_eq!(restored.history().len(), 1);
        assert_eq!(restored.settings(), &TrackerSettings::default());
    }
}
