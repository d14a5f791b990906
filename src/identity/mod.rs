//! Identity graph: beliefs, values and stories, the tensions between them,
//! and reasoning loops over `leads_to` edges.

pub mod cycles;
pub mod graph;
pub mod snapshot;
pub mod types;

pub use graph::IdentityGraph;
pub use snapshot::{IdentityDelta, IdentitySnapshot};
pub use types::{
    BeliefStatus, IdentityEdge, IdentityNode, NodeId, NodeKind, Relation, Tension, TensionStatus,
    TensionType,
};
