//! Graph store for the Peel editor core.
//!
//! Nodes carry opaque JSON payloads and decimal-string keys from a shared
//! counter. Edges are undirected, at most one per unordered node pair, and
//! keyed by their endpoints.
//!
//! # Modules
//!
//! - [`error`] -- Error types for graph-store operations.
//! - [`graph`] -- [`Graph`], [`Node`], [`Edge`] and the [`KeyAllocator`].

pub mod error;
pub mod graph;

// Re-export primary types at crate root.
pub use error::GraphError;
pub use graph::{Edge, Graph, KeyAllocator, Node};
