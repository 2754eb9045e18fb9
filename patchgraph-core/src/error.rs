//! Error Types
//!
//! Every fallible graph operation returns [`GraphError`]. None of them panic
//! on ordinary misuse such as stale handles or duplicate edges, and a failed
//! call leaves the graph exactly as it was.

use crate::graph::NodeHandle;

/// Errors produced by graph mutation and lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The handle does not refer to a live node of this graph. The node was
    /// removed, or the handle came from a different graph instance.
    #[error("node {0} is not in this graph")]
    NotInGraph(NodeHandle),

    /// An adjacency list was asked to drop a position past its end.
    ///
    /// This can only happen if the adjacency lists were already inconsistent,
    /// so it points at a bug in the graph rather than in the caller.
    #[error("adjacency position {position} is out of range for a list of length {len}")]
    AdjacencyOutOfRange {
        /// The requested position.
        position: usize,
        /// The length of the list at the time of the request.
        len: usize,
    },
}

/// Result alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors produced while loading a [`GraphConfig`](crate::config::GraphConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration text was not valid JSON for the expected shape.
    #[error("invalid graph config: {0}")]
    Parse(#[from] serde_json::Error),
}
