//! Error taxonomy for the reflection pipeline.
//!
//! Only structural problems reach the caller: graph consistency violations,
//! malformed input, cancellation. Provider failures and guardrail violations
//! are absorbed by the stages that produce them.

use thiserror::Error;

use crate::identity::NodeId;

/// An edge referenced a node that is not in the graph.
///
/// The mutation is rejected as a whole; nothing is applied partially.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("edge {from} -> {to} references missing node {missing}")]
pub struct GraphConsistencyError {
    pub from: NodeId,
    pub to: NodeId,
    pub missing: NodeId,
}

/// A stored identity graph whose ids do not line up with its arena.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphIntegrityError {
    #[error("{adjacency} adjacency lists for {nodes} nodes")]
    AdjacencyLength { nodes: usize, adjacency: usize },

    #[error("node at index {index} carries id {id}")]
    MisplacedNode { index: usize, id: NodeId },

    #[error(transparent)]
    Dangling(#[from] GraphConsistencyError),
}

/// Malformed caller or analyzer input, rejected before pipeline entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single generation backend call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The call did not complete within the backend's timeout.
    #[error("backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No API key was found in the configured environment variable.
    #[error("missing API key (expected in ${0})")]
    MissingApiKey(String),

    /// No backend is able to serve the request.
    #[error("no backend available: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failure reported by an external analyzer.
#[derive(Debug, Clone, Error)]
#[error("analyzer failed: {0}")]
pub struct AnalyzerError(pub String);

/// Failure reported by the external state repository.
#[derive(Debug, Clone, Error)]
#[error("repository error: {0}")]
pub struct RepositoryError(pub String);

/// Caller-facing error of the reflection pipeline.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    GraphConsistency(#[from] GraphConsistencyError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The caller cancelled the request before it completed.
    #[error("request cancelled before completion")]
    Cancelled,
}

/// Result alias used throughout the crate.
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
