//! One user's long-lived reflection state.

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisInput, ContradictionKind};
use crate::config::MirrorConfig;
use crate::error::GraphConsistencyError;
use crate::evolution::{Observation, PatternTracker, TrackerSettings};
use crate::identity::{IdentityGraph, IdentitySnapshot, NodeId, NodeKind, Relation, TensionType};

/// Labels starting with these become value nodes rather than beliefs.
const VALUE_OPENERS: &[&str] = &["i value", "i care about"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserState {
    pub graph: IdentityGraph,
    pub tracker: PatternTracker,
}

impl UserState {
    pub fn new(config: &MirrorConfig) -> Self {
        Self {
            graph: IdentityGraph::with_params(config.tension),
            tracker: PatternTracker::new(TrackerSettings::from(config)),
        }
    }

    /// Point a loaded state at the current thresholds. Stored state carries
    /// history only.
    pub fn apply_config(&mut self, config: &MirrorConfig) {
        self.graph.set_params(config.tension);
        self.tracker.set_settings(TrackerSettings::from(config));
    }

    /// Graph snapshot with the tracker's loops, regressions and growth
    /// signals filled in.
    pub fn snapshot(&self) -> IdentitySnapshot {
        let mut snapshot = self.graph.snapshot();
        self.tracker.annotate(&mut snapshot);
        snapshot
    }

    /// Fold one analyzed reflection into the graph and the tracker.
    ///
    /// Status updates run against what was known before this reflection,
    /// so a belief is never softened by the sentence that introduced it.
    pub fn ingest(
        &mut self,
        text: &str,
        analysis: &AnalysisInput,
    ) -> Result<Observation, GraphConsistencyError> {
        let observation = self
            .tracker
            .observe(text, Some(analysis.emotion.primary.as_str()));

        self.graph.update_tension_status(text);
        self.graph.observe_belief_changes(text);

        let existing: Vec<NodeId> = self
            .graph
            .nodes()
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Belief | NodeKind::Value))
            .map(|n| n.id)
            .collect();

        let semantic = &analysis.semantic;
        let mut beliefs = Vec::new();
        let mut created = Vec::new();
        for label in semantic.beliefs_stated.iter().chain(&semantic.beliefs_implied) {
            let (id, new) = self.graph.upsert_node(belief_kind(label), label);
            if !beliefs.contains(&id) {
                beliefs.push(id);
            }
            if new {
                created.push(id);
            }
        }
        for pair in beliefs.windows(2) {
            self.graph.add_edge(pair[0], pair[1], Relation::LeadsTo)?;
        }

        for story in &semantic.self_stories {
            let (story_id, _) = self.graph.upsert_node(NodeKind::Story, story);
            for &belief in &beliefs {
                self.graph.add_edge(story_id, belief, Relation::Supports)?;
            }
        }

        for &new_id in &created {
            for &old_id in &existing {
                self.graph.record_tension(new_id, old_id);
            }
        }

        for contradiction in &analysis.logic.contradictions {
            let a = self.claim_node(&contradiction.claim_a);
            let b = self.claim_node(&contradiction.claim_b);
            let kind = match contradiction.kind {
                ContradictionKind::Hard => TensionType::Conflict,
                ContradictionKind::Soft => TensionType::Paradox,
            };
            self.graph.insert_tension(a, b, kind)?;
        }

        Ok(observation)
    }

    fn claim_node(&mut self, claim: &str) -> NodeId {
        self.graph
            .find_node(NodeKind::Value, claim)
            .unwrap_or_else(|| self.graph.upsert_node(NodeKind::Belief, claim).0)
    }
}

fn belief_kind(label: &str) -> NodeKind {
    let lowered = label.trim().to_lowercase();
    if VALUE_OPENERS.iter().any(|o| lowered.starts_with(o)) {
        NodeKind::Value
    } else {
        NodeKind::Belief
    }
}
