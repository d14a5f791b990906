//! Per-user identity graph.
//!
//! Nodes live in an arena (`Vec`) addressed by [`NodeId`]; adjacency lists
//! are parallel to it and hold ids, never references. Nodes are never
//! removed, so an id stays valid for the lifetime of the graph.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::cycles::simple_cycles;
use super::snapshot::{IdentityDelta, IdentitySnapshot};
use super::types::{
    BeliefStatus, IdentityEdge, IdentityNode, NodeId, NodeKind, Relation, Tension, TensionStatus,
    TensionType,
};
use crate::config::TensionParams;
use crate::error::{GraphConsistencyError, GraphIntegrityError};
use crate::utilities::string_utils::{content_tokens, phrase_hits, tokenize};

/// Commitment markers that oppose each other across two labels.
///
/// When the second marker contains the first (`need` / `don't need`) the
/// side claiming the first must not also contain the second.
const OPPOSING_PAIRS: &[(&str, &str)] = &[
    ("always", "never"),
    ("love", "hate"),
    ("want", "fear"),
    ("stay", "leave"),
    ("trust", "distrust"),
    ("strong", "weak"),
    ("together", "alone"),
    ("safe", "risk"),
    ("hold on", "let go"),
    ("control", "surrender"),
    ("need", "don't need"),
    ("enough", "not enough"),
    ("can", "can't"),
    ("should", "shouldn't"),
    ("succeed", "fail"),
];

const NEGATORS: &[&str] = &[
    "not", "never", "don't", "no", "can't", "won't", "isn't", "aren't", "doesn't",
];

const GOAL_WORDS: &[&str] = &["want", "goal", "plan", "going to", "hope to", "trying to"];

const SOFTENING_MARKERS: &[&str] = &[
    "sometimes", "both", "maybe", "i can hold", "it's okay to", "less", "not as",
];

const RESOLUTION_MARKERS: &[&str] = &[
    "made peace", "resolved", "no longer", "accept", "let it go", "at peace",
];

const REJECTION_MARKERS: &[&str] = &[
    "don't believe", "not anymore", "no longer", "used to think", "used to believe",
];

const REFRAME_MARKERS: &[&str] = &["actually", "instead", "rather", "realize"];

const HEDGE_MARKERS: &[&str] = &["maybe", "sometimes", "not always", "partly"];

fn has(tokens: &[String], marker: &str) -> bool {
    phrase_hits(tokens, marker) > 0
}

fn has_any(tokens: &[String], markers: &[&str]) -> bool {
    markers.iter().any(|m| has(tokens, m))
}

/// Number of opposing commitment pairs between two labels. Symmetric.
fn opposition_count(a: &str, b: &str) -> usize {
    let ta = tokenize(a);
    let tb = tokenize(b);

    let mut count = OPPOSING_PAIRS
        .iter()
        .filter(|(x, y)| {
            (has(&ta, x) && !has(&ta, y) && has(&tb, y))
                || (has(&tb, x) && !has(&tb, y) && has(&ta, y))
        })
        .count();

    // "I am enough" vs "I am not enough": same content, one side negated.
    let strip = |tokens: &[String]| -> HashSet<String> {
        tokens
            .iter()
            .filter(|t| !NEGATORS.contains(&t.as_str()))
            .cloned()
            .collect::<HashSet<_>>()
    };
    let negated_a = ta.iter().any(|t| NEGATORS.contains(&t.as_str()));
    let negated_b = tb.iter().any(|t| NEGATORS.contains(&t.as_str()));
    let ca = strip(&ta);
    if negated_a != negated_b && !ca.is_empty() && ca == strip(&tb) {
        count += 1;
    }
    count
}

/// Per-user directed graph of beliefs, values and stories.
///
/// Tuning is not persisted; the owner sets it from the current config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "StoredGraph")]
pub struct IdentityGraph {
    nodes: Vec<IdentityNode>,
    adjacency: Vec<Vec<(NodeId, Relation)>>,
    tensions: Vec<Tension>,
    #[serde(skip)]
    params: TensionParams,
}

/// Serialized form of [`IdentityGraph`], checked before it becomes one.
#[derive(Deserialize)]
struct StoredGraph {
    nodes: Vec<IdentityNode>,
    adjacency: Vec<Vec<(NodeId, Relation)>>,
    tensions: Vec<Tension>,
}

impl TryFrom<StoredGraph> for IdentityGraph {
    type Error = GraphIntegrityError;

    fn try_from(stored: StoredGraph) -> Result<Self, Self::Error> {
        if stored.adjacency.len() != stored.nodes.len() {
            return Err(GraphIntegrityError::AdjacencyLength {
                nodes: stored.nodes.len(),
                adjacency: stored.adjacency.len(),
            });
        }
        if let Some((index, node)) = stored
            .nodes
            .iter()
            .enumerate()
            .find(|(i, n)| n.id != NodeId(*i as u64))
        {
            return Err(GraphIntegrityError::MisplacedNode { index, id: node.id });
        }

        let len = stored.nodes.len() as u64;
        for (from, out) in stored.adjacency.iter().enumerate() {
            if let Some(&(to, _)) = out.iter().find(|(to, _)| to.0 >= len) {
                return Err(GraphConsistencyError {
                    from: NodeId(from as u64),
                    to,
                    missing: to,
                }
                .into());
            }
        }
        for t in &stored.tensions {
            if let Some(missing) = [t.pole_a_id, t.pole_b_id].into_iter().find(|id| id.0 >= len) {
                return Err(GraphConsistencyError {
                    from: t.pole_a_id,
                    to: t.pole_b_id,
                    missing,
                }
                .into());
            }
        }

        Ok(Self {
            nodes: stored.nodes,
            adjacency: stored.adjacency,
            tensions: stored.tensions,
            params: TensionParams::default(),
        })
    }
}

impl IdentityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: TensionParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &TensionParams {
        &self.params
    }

    pub fn set_params(&mut self, params: TensionParams) {
        self.params = params;
    }

    // -----------------------------------------------------------------------
    // Nodes and edges
    // -----------------------------------------------------------------------

    /// Append a node. Always succeeds.
    pub fn add_node(&mut self, kind: NodeKind, label: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(IdentityNode {
            id,
            kind,
            label: label.into().trim().to_string(),
            created_at: Utc::now(),
            status: BeliefStatus::Active,
        });
        self.adjacency.push(Vec::new());
        id
    }

    /// Return the node with this kind and label (case-insensitive), adding
    /// it if absent. The flag reports whether a node was created.
    pub fn upsert_node(&mut self, kind: NodeKind, label: &str) -> (NodeId, bool) {
        match self.find_node(kind, label) {
            Some(id) => (id, false),
            None => (self.add_node(kind, label), true),
        }
    }

    pub fn find_node(&self, kind: NodeKind, label: &str) -> Option<NodeId> {
        let wanted = label.trim().to_lowercase();
        self.nodes
            .iter()
            .find(|n| n.kind == kind && n.label.to_lowercase() == wanted)
            .map(|n| n.id)
    }

    pub fn node(&self, id: NodeId) -> Option<&IdentityNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[IdentityNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a directed edge. Duplicates are ignored.
    ///
    /// # Errors
    /// [`GraphConsistencyError`] if either endpoint is absent; the graph is
    /// left untouched.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        relation: Relation,
    ) -> Result<(), GraphConsistencyError> {
        for id in [from, to] {
            if self.node(id).is_none() {
                return Err(GraphConsistencyError { from, to, missing: id });
            }
        }
        let out = &mut self.adjacency[from.0 as usize];
        if !out.contains(&(to, relation)) {
            out.push((to, relation));
        }
        Ok(())
    }

    pub fn edges(&self) -> impl Iterator<Item = IdentityEdge> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(from, out)| {
            out.iter().map(move |&(to_id, relation)| IdentityEdge {
                from_id: NodeId(from as u64),
                to_id,
                relation,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Tensions
    // -----------------------------------------------------------------------

    /// Compare two nodes' labels for opposing commitments.
    ///
    /// Order-independent; unknown ids or unrelated labels yield `None`.
    pub fn detect_tension(&self, a: NodeId, b: NodeId) -> Option<Tension> {
        if a == b {
            return None;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (na, nb) = (self.node(lo)?, self.node(hi)?);

        let pairs = opposition_count(&na.label, &nb.label);
        if pairs < self.params.opposition_threshold.max(1) {
            return None;
        }

        let ta = tokenize(&na.label);
        let tb = tokenize(&nb.label);
        let kind = if na.kind == NodeKind::Value && nb.kind == NodeKind::Value {
            TensionType::Identity
        } else if has_any(&ta, GOAL_WORDS) || has_any(&tb, GOAL_WORDS) {
            TensionType::Goal
        } else if !content_tokens(&na.label).is_disjoint(&content_tokens(&nb.label)) {
            TensionType::Paradox
        } else {
            TensionType::Conflict
        };

        Some(self.make_tension(na, nb, kind, pairs))
    }

    fn make_tension(
        &self,
        na: &IdentityNode,
        nb: &IdentityNode,
        kind: TensionType,
        pairs: usize,
    ) -> Tension {
        let strength =
            (self.params.base_strength + self.params.pair_weight * pairs as f64).clamp(0.0, 1.0);
        Tension {
            label: format!("{} vs {}", na.label, nb.label),
            pole_a: na.label.clone(),
            pole_b: nb.label.clone(),
            pole_a_id: na.id,
            pole_b_id: nb.id,
            kind,
            status: TensionStatus::Active,
            strength,
        }
    }

    fn has_tension(&self, a: NodeId, b: NodeId) -> bool {
        let key = if a < b { (a, b) } else { (b, a) };
        self.tensions.iter().any(|t| t.key() == key)
    }

    /// Detect and store a tension between two nodes, linking them with a
    /// `conflicts` edge. Returns the new tension, or `None` when there is
    /// no signal or the pair already has one.
    pub fn record_tension(&mut self, a: NodeId, b: NodeId) -> Option<Tension> {
        if self.has_tension(a, b) {
            return None;
        }
        let tension = self.detect_tension(a, b)?;
        self.store_tension(tension.clone());
        Some(tension)
    }

    /// Store a tension flagged by an external analyzer, bypassing the
    /// lexical heuristic.
    pub fn insert_tension(
        &mut self,
        a: NodeId,
        b: NodeId,
        kind: TensionType,
    ) -> Result<Option<Tension>, GraphConsistencyError> {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (na, nb) = match (self.node(lo), self.node(hi)) {
            (Some(na), Some(nb)) => (na, nb),
            (None, _) => return Err(GraphConsistencyError { from: a, to: b, missing: lo }),
            (_, None) => return Err(GraphConsistencyError { from: a, to: b, missing: hi }),
        };
        if lo == hi || self.has_tension(lo, hi) {
            return Ok(None);
        }
        let pairs = opposition_count(&na.label, &nb.label);
        let tension = self.make_tension(na, nb, kind, pairs);
        self.store_tension(tension.clone());
        Ok(Some(tension))
    }

    fn store_tension(&mut self, tension: Tension) {
        let (lo, hi) = tension.key();
        // Both endpoints were just resolved from the arena.
        let out = &mut self.adjacency[lo.0 as usize];
        if !out.contains(&(hi, Relation::Conflicts)) {
            out.push((hi, Relation::Conflicts));
        }
        log::debug!("recorded {:?} tension: {}", tension.kind, tension.label);
        self.tensions.push(tension);
    }

    pub fn tensions(&self) -> &[Tension] {
        &self.tensions
    }

    fn mentions(&self, label: &str, text_tokens: &HashSet<String>) -> bool {
        let label_tokens = content_tokens(label);
        if label_tokens.is_empty() {
            return false;
        }
        let shared = label_tokens.intersection(text_tokens).count();
        shared as f64 / label_tokens.len() as f64 >= self.params.softening_overlap
    }

    /// Advance tension statuses from a new reflection. Returns the tensions
    /// whose status or strength changed.
    ///
    /// A tension counts as mentioned when either pole's label reappears.
    /// Softening language moves `active → softened`; resolution language
    /// moves one step forward; a plain mention of an active tension
    /// intensifies it. Resolved tensions never change again.
    pub fn update_tension_status(&mut self, text: &str) -> Vec<Tension> {
        let tokens = tokenize(text);
        let text_tokens = content_tokens(text);
        let softening = has_any(&tokens, SOFTENING_MARKERS);
        let resolving = has_any(&tokens, RESOLUTION_MARKERS);
        let bump = self.params.pair_weight / 2.0;

        let mentioned: Vec<bool> = self
            .tensions
            .iter()
            .map(|t| self.mentions(&t.pole_a, &text_tokens) || self.mentions(&t.pole_b, &text_tokens))
            .collect();

        let mut changed = Vec::new();
        for (tension, mentioned) in self.tensions.iter_mut().zip(mentioned) {
            if !mentioned || tension.status == TensionStatus::Resolved {
                continue;
            }
            let before = (tension.status, tension.strength);
            match tension.status {
                TensionStatus::Active if resolving || softening => {
                    tension.status = TensionStatus::Softened;
                }
                TensionStatus::Active => {
                    tension.strength = (tension.strength + bump).min(1.0);
                }
                TensionStatus::Softened if resolving => {
                    tension.status = TensionStatus::Resolved;
                }
                _ => {}
            }
            if before != (tension.status, tension.strength) {
                changed.push(tension.clone());
            }
        }
        changed
    }

    /// Update belief and value statuses mentioned in a new reflection.
    /// Rejected beliefs stay rejected.
    pub fn observe_belief_changes(&mut self, text: &str) -> Vec<IdentityNode> {
        let tokens = tokenize(text);
        let text_tokens = content_tokens(text);
        let next = if has_any(&tokens, REJECTION_MARKERS) {
            BeliefStatus::Rejected
        } else if has_any(&tokens, REFRAME_MARKERS) {
            BeliefStatus::Reframed
        } else if has_any(&tokens, HEDGE_MARKERS) {
            BeliefStatus::Softened
        } else {
            return Vec::new();
        };

        let targets: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Belief | NodeKind::Value))
            .filter(|(_, n)| n.status != BeliefStatus::Rejected && n.status != next)
            .filter(|(_, n)| self.mentions(&n.label, &text_tokens))
            .map(|(i, _)| i)
            .collect();

        targets
            .into_iter()
            .map(|i| {
                self.nodes[i].status = next;
                self.nodes[i].clone()
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Loops, snapshots, deltas
    // -----------------------------------------------------------------------

    /// Every elementary cycle over `leads_to` edges.
    pub fn find_loops(&self) -> Vec<Vec<NodeId>> {
        let successors: Vec<Vec<usize>> = self
            .adjacency
            .iter()
            .map(|out| {
                let mut succ: Vec<usize> = out
                    .iter()
                    .filter(|(_, r)| *r == Relation::LeadsTo)
                    .map(|(to, _)| to.0 as usize)
                    .collect();
                succ.sort_unstable();
                succ.dedup();
                succ
            })
            .collect();

        simple_cycles(&successors)
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| NodeId(i as u64)).collect())
            .collect()
    }

    /// Graph half of a snapshot; tracker fields are left empty.
    pub fn snapshot(&self) -> IdentitySnapshot {
        let dominant_tension = self
            .tensions
            .iter()
            .filter(|t| t.is_active())
            .fold(None::<&Tension>, |best, t| match best {
                Some(b) if b.strength >= t.strength => Some(b),
                _ => Some(t),
            })
            .cloned();

        IdentitySnapshot {
            taken_at: Utc::now(),
            nodes: self.nodes.clone(),
            edges: self.edges().collect(),
            tensions: self.tensions.clone(),
            reasoning_loops: self.find_loops(),
            dominant_tension,
            ..IdentitySnapshot::default()
        }
    }

    pub fn calculate_delta(old: &IdentitySnapshot, new: &IdentitySnapshot) -> IdentityDelta {
        IdentityDelta::between(old, new)
    }
}
