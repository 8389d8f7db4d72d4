//! The read/write surface shared by the stream and dispatch adapters.
//!
//! Subsystems hold a [`DispatchAdapter`](crate::DispatchAdapter); tools and
//! tests often hold the [`EventStream`] itself. Both implement
//! [`GraphAccess`], so code written against the trait works with either and
//! only the attributed [`Emitter`] differs.

use peel_graph::{Edge, Node};
use peel_types::{EdgeKey, Emitter, NodeKey};
use serde_json::Value;

use crate::error::StreamError;
use crate::stream::EventStream;

/// Graph reads and event-producing mutations.
///
/// Reads return owned copies so no borrow of the graph outlives the call.
pub trait GraphAccess {
    /// The stream mutations are applied to.
    fn stream(&self) -> &EventStream;

    /// The emitter attributed to mutations made through this handle.
    fn emitter(&self) -> Emitter;

    /// Add a node.
    fn add_node(&self, payload: Value) -> Result<Node, StreamError> {
        self.stream().add_node_as(payload, self.emitter())
    }

    /// Connect two nodes.
    fn add_edge(&self, first: &NodeKey, second: &NodeKey, payload: Value) -> Result<Edge, StreamError> {
        self.stream()
            .add_edge_as(first, second, payload, self.emitter())
    }

    /// Remove a node and its incident edges. `Ok(false)` if it was absent.
    fn remove_node(&self, key: &NodeKey) -> Result<bool, StreamError> {
        self.stream().remove_node_as(key, self.emitter())
    }

    /// Remove an edge. `Ok(false)` if it was absent.
    fn remove_edge(&self, key: &EdgeKey) -> Result<bool, StreamError> {
        self.stream().remove_edge_as(key, self.emitter())
    }

    /// Look up a node.
    fn node(&self, key: &NodeKey) -> Option<Node> {
        self.stream().with_graph(|graph| graph.node(key).cloned())
    }

    /// Look up an edge.
    fn edge(&self, key: &EdgeKey) -> Option<Edge> {
        self.stream().with_graph(|graph| graph.edge(key).cloned())
    }

    /// The edge connecting `a` and `b`, in either order.
    fn edge_between(&self, a: &NodeKey, b: &NodeKey) -> Option<Edge> {
        self.stream()
            .with_graph(|graph| graph.edge_between(a, b).cloned())
    }

    /// Both endpoints of an edge.
    fn nodes_of_edge(&self, key: &EdgeKey) -> Option<(NodeKey, NodeKey)> {
        self.stream().with_graph(|graph| {
            graph
                .nodes_of_edge(key)
                .map(|(first, second)| (first.clone(), second.clone()))
        })
    }

    /// Keys of the edges incident to a node.
    fn edges_of_node(&self, key: &NodeKey) -> Vec<EdgeKey> {
        self.stream()
            .with_graph(|graph| graph.edges_of_node(key).cloned().collect())
    }

    /// All node keys in key order.
    fn node_keys(&self) -> Vec<NodeKey> {
        self.stream()
            .with_graph(|graph| graph.node_keys().cloned().collect())
    }

    /// All edges in key order.
    fn edges(&self) -> Vec<Edge> {
        self.stream()
            .with_graph(|graph| graph.edges().cloned().collect())
    }

    /// Number of nodes.
    fn node_count(&self) -> usize {
        self.stream().with_graph(peel_graph::Graph::node_count)
    }

    /// Number of edges.
    fn edge_count(&self) -> usize {
        self.stream().with_graph(peel_graph::Graph::edge_count)
    }

    /// Whether the node exists.
    fn contains_node(&self, key: &NodeKey) -> bool {
        self.stream().with_graph(|graph| graph.contains_node(key))
    }

    /// Whether the edge exists.
    fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.stream().with_graph(|graph| graph.contains_edge(key))
    }
}

impl GraphAccess for EventStream {
    fn stream(&self) -> &EventStream {
        self
    }

    fn emitter(&self) -> Emitter {
        Emitter::Stream
    }
}
