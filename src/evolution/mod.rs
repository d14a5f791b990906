//! Evolution engine: regression, loop and growth signals derived from a
//! user's time-ordered reflections.

pub mod detectors;
pub mod growth;
pub mod markers;
pub mod tracker;

pub use detectors::{detect_avoidance, detect_judgment_spike, detect_loop, detect_self_attack};
pub use growth::{Breakthrough, GrowthMetrics};
pub use markers::{Loop, RegressionKind, RegressionMarker};
pub use tracker::{HistoryEntry, Observation, PatternTracker, TrackerSettings};
