//! Error types for the `peel-graph` crate.
//!
//! All fallible operations in this crate return [`GraphError`] through the
//! standard [`Result`] type.

use peel_types::{EdgeKey, NodeKey};

/// Errors that can occur during graph-store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node referenced by an operation is not in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(NodeKey),

    /// The unordered node pair is already connected by an edge.
    #[error("duplicate edge: {0}")]
    DuplicateEdge(EdgeKey),

    /// The node key counter cannot be advanced any further.
    #[error("node key space exhausted")]
    KeySpaceExhausted,
}
