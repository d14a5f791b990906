//! Identity graph data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arena key of a node, unique within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Belief,
    Value,
    Story,
}

/// Where a belief currently stands for the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefStatus {
    Active,
    Softened,
    Reframed,
    /// Terminal.
    Rejected,
}

impl Default for BeliefStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: BeliefStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Supports,
    Conflicts,
    LeadsTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityEdge {
    pub from_id: NodeId,
    pub to_id: NodeId,
    pub relation: Relation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionType {
    Paradox,
    Conflict,
    Identity,
    Goal,
}

/// Lifecycle of a tension. Transitions only move forward:
/// `active → softened → resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionStatus {
    Active,
    Softened,
    Resolved,
}

/// A recorded conflict or paradox between two nodes.
///
/// `pole_a_id` is always the smaller id so a pair has one canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tension {
    pub label: String,
    pub pole_a: String,
    pub pole_b: String,
    pub pole_a_id: NodeId,
    pub pole_b_id: NodeId,
    #[serde(rename = "type")]
    pub kind: TensionType,
    pub status: TensionStatus,
    pub strength: f64,
}

impl Tension {
    pub fn key(&self) -> (NodeId, NodeId) {
        (self.pole_a_id, self.pole_b_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == TensionStatus::Active
    }
}
