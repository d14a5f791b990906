//! Read-only projections of a user's identity state and the diff between two.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{
    BeliefStatus, IdentityEdge, IdentityNode, NodeId, NodeKind, Tension, TensionStatus,
};
use crate::evolution::{Loop, RegressionMarker};

/// Graph plus tracker state at one point in time.
///
/// `regressions` holds only the markers raised by the most recent
/// reflection; the full history is on the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub taken_at: DateTime<Utc>,
    pub nodes: Vec<IdentityNode>,
    pub edges: Vec<IdentityEdge>,
    pub tensions: Vec<Tension>,
    /// Cycles over `leads_to` edges.
    pub reasoning_loops: Vec<Vec<NodeId>>,
    /// Lexical loops across reflections.
    pub loops: Vec<Loop>,
    pub regressions: Vec<RegressionMarker>,
    pub dominant_tension: Option<Tension>,
    pub growth_signals: Vec<String>,
}

impl IdentitySnapshot {
    pub fn active_tensions(&self) -> impl Iterator<Item = &Tension> {
        self.tensions.iter().filter(|t| t.is_active())
    }

    pub fn active_loops(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter().filter(|l| l.is_active())
    }

    pub fn active_loop_count(&self) -> usize {
        self.active_loops().count()
    }

    pub fn has_active_regression(&self) -> bool {
        !self.regressions.is_empty()
    }

    /// Belief and value nodes, in creation order.
    pub fn beliefs(&self) -> impl Iterator<Item = &IdentityNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Belief | NodeKind::Value))
    }
}

/// Structural diff between two snapshots. Always recomputable; never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityDelta {
    pub new_tensions: Vec<Tension>,
    pub intensified_tensions: Vec<Tension>,
    pub softened_tensions: Vec<Tension>,
    pub resolved_tensions: Vec<Tension>,
    pub new_loops: Vec<Loop>,
    pub reinforced_loops: Vec<Loop>,
    pub weakened_loops: Vec<Loop>,
    pub broken_loops: Vec<Loop>,
    pub new_beliefs: Vec<IdentityNode>,
    pub softened_beliefs: Vec<IdentityNode>,
    pub reframed_beliefs: Vec<IdentityNode>,
    pub rejected_beliefs: Vec<IdentityNode>,
    pub new_reasoning_loops: Vec<Vec<NodeId>>,
}

impl IdentityDelta {
    pub fn between(old: &IdentitySnapshot, new: &IdentitySnapshot) -> Self {
        let mut delta = Self::default();

        let old_tensions: HashMap<(NodeId, NodeId), &Tension> =
            old.tensions.iter().map(|t| (t.key(), t)).collect();
        for t in &new.tensions {
            match old_tensions.get(&t.key()) {
                None => delta.new_tensions.push(t.clone()),
                Some(prev) if prev.status != t.status => match t.status {
                    TensionStatus::Softened => delta.softened_tensions.push(t.clone()),
                    TensionStatus::Resolved => delta.resolved_tensions.push(t.clone()),
                    TensionStatus::Active => {}
                },
                Some(prev) if t.is_active() && t.strength > prev.strength => {
                    delta.intensified_tensions.push(t.clone())
                }
                Some(_) => {}
            }
        }

        let old_loops: HashMap<Uuid, &Loop> = old.loops.iter().map(|l| (l.pattern_id, l)).collect();
        for l in &new.loops {
            match old_loops.get(&l.pattern_id) {
                None => delta.new_loops.push(l.clone()),
                Some(prev) if l.broken && !prev.broken => delta.broken_loops.push(l.clone()),
                Some(prev) if l.occurrences > prev.occurrences => {
                    delta.reinforced_loops.push(l.clone())
                }
                Some(prev) if !l.broken && l.strength < prev.strength => {
                    delta.weakened_loops.push(l.clone())
                }
                Some(_) => {}
            }
        }

        let old_beliefs: HashMap<NodeId, &IdentityNode> =
            old.beliefs().map(|n| (n.id, n)).collect();
        for n in new.beliefs() {
            match old_beliefs.get(&n.id) {
                None => delta.new_beliefs.push(n.clone()),
                Some(prev) if prev.status != n.status => match n.status {
                    BeliefStatus::Softened => delta.softened_beliefs.push(n.clone()),
                    BeliefStatus::Reframed => delta.reframed_beliefs.push(n.clone()),
                    BeliefStatus::Rejected => delta.rejected_beliefs.push(n.clone()),
                    BeliefStatus::Active => {}
                },
                Some(_) => {}
            }
        }

        let old_cycles: HashSet<&Vec<NodeId>> = old.reasoning_loops.iter().collect();
        delta.new_reasoning_loops = new
            .reasoning_loops
            .iter()
            .filter(|c| !old_cycles.contains(c))
            .cloned()
            .collect();

        delta
    }

    pub fn is_empty(&self) -> bool {
        self.counts().iter().all(|(n, _)| *n == 0)
    }

    fn counts(&self) -> [(usize, &'static str); 13] {
        [
            (self.new_tensions.len(), "new tension"),
            (self.intensified_tensions.len(), "intensified tension"),
            (self.softened_tensions.len(), "softened tension"),
            (self.resolved_tensions.len(), "resolved tension"),
            (self.new_loops.len(), "new loop"),
            (self.reinforced_loops.len(), "reinforced loop"),
            (self.weakened_loops.len(), "weakened loop"),
            (self.broken_loops.len(), "broken loop"),
            (self.new_beliefs.len(), "new belief"),
            (self.softened_beliefs.len(), "softened belief"),
            (self.reframed_beliefs.len(), "reframed belief"),
            (self.rejected_beliefs.len(), "rejected belief"),
            (self.new_reasoning_loops.len(), "new reasoning loop"),
        ]
    }

    /// Compact description such as `"1 new tension, 2 reinforced loops"`.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .counts()
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, what)| format!("{} {}{}", n, what, if *n == 1 { "" } else { "s" }))
            .collect();
        if parts.is_empty() {
            "no change".to_string()
        } else {
            parts.join(", ")
        }
    }
}
