//! The graph store: nodes, undirected edges, and their adjacency index.
//!
//! [`Graph`] owns node and edge existence. Node keys come from a
//! [`KeyAllocator`]; edge keys are derived from the endpoint keys through
//! [`EdgeKey::between`], which makes "at most one edge per unordered pair" a
//! plain map lookup.
//!
//! Internally an adjacency map indexes incident edges per node:
//! `BTreeMap<NodeKey, BTreeSet<EdgeKey>>`. Removing a node walks that set so
//! no dangling edge can survive its endpoint.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use peel_types::{EdgeKey, NodeKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::GraphError;

/// Shared source of node keys.
///
/// Cloning the allocator shares the counter, so every graph built from clones
/// of one allocator draws from the same key sequence.
#[derive(Debug, Clone, Default)]
pub struct KeyAllocator {
    next: Rc<Cell<u64>>,
}

impl KeyAllocator {
    /// Create an allocator whose first key is "0".
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator whose first key is `value`.
    pub fn starting_at(value: u64) -> Self {
        Self {
            next: Rc::new(Cell::new(value)),
        }
    }

    /// The counter value the next allocation will use.
    pub fn peek(&self) -> u64 {
        self.next.get()
    }

    /// Allocate the next node key.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::KeySpaceExhausted`] once the counter can no
    /// longer be advanced.
    pub fn allocate(&self) -> Result<NodeKey, GraphError> {
        let value = self.next.get();
        let advanced = value.checked_add(1).ok_or(GraphError::KeySpaceExhausted)?;
        self.next.set(advanced);
        Ok(NodeKey::from_counter(value))
    }
}

/// A vertex of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique key, never reused within one allocator.
    pub key: NodeKey,
    /// Opaque data attached by the caller.
    pub payload: Value,
}

/// An undirected connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Key derived from both endpoints.
    pub key: EdgeKey,
    /// First endpoint, as passed to [`Graph::add_edge`].
    pub first: NodeKey,
    /// Second endpoint, as passed to [`Graph::add_edge`].
    pub second: NodeKey,
    /// Opaque data attached by the caller.
    pub payload: Value,
}

impl Edge {
    /// Whether `key` is one of this edge's endpoints.
    pub fn touches(&self, key: &NodeKey) -> bool {
        &self.first == key || &self.second == key
    }
}

/// The graph store.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Source of node keys.
    allocator: KeyAllocator,
    /// All nodes indexed by key.
    nodes: BTreeMap<NodeKey, Node>,
    /// All edges indexed by key.
    edges: BTreeMap<EdgeKey, Edge>,
    /// Incident edges per node.
    adjacency: BTreeMap<NodeKey, BTreeSet<EdgeKey>>,
}

impl Graph {
    /// Create an empty graph with a fresh key counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph drawing keys from `allocator`.
    pub const fn with_allocator(allocator: KeyAllocator) -> Self {
        Self {
            allocator,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            adjacency: BTreeMap::new(),
        }
    }

    /// The allocator this graph draws node keys from.
    pub const fn allocator(&self) -> &KeyAllocator {
        &self.allocator
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Add a node with a freshly allocated key.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::KeySpaceExhausted`] if no key can be allocated.
    pub fn add_node(&mut self, payload: Value) -> Result<&Node, GraphError> {
        let key = self.allocator.allocate()?;
        debug!(node = %key, "node added");
        self.adjacency.entry(key.clone()).or_default();
        let node = self
            .nodes
            .entry(key.clone())
            .or_insert(Node { key, payload });
        Ok(&*node)
    }

    /// Connect `first` and `second`.
    ///
    /// A node may be connected to itself. The edge keeps the argument order
    /// in [`Edge::first`] and [`Edge::second`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if either endpoint is missing, or
    /// [`GraphError::DuplicateEdge`] if the pair is already connected. The
    /// graph is unchanged on error.
    pub fn add_edge(
        &mut self,
        first: &NodeKey,
        second: &NodeKey,
        payload: Value,
    ) -> Result<&Edge, GraphError> {
        if !self.nodes.contains_key(first) {
            return Err(GraphError::NodeNotFound(first.clone()));
        }
        if !self.nodes.contains_key(second) {
            return Err(GraphError::NodeNotFound(second.clone()));
        }
        let key = EdgeKey::between(first, second);
        if self.edges.contains_key(&key) {
            return Err(GraphError::DuplicateEdge(key));
        }

        debug!(edge = %key, first = %first, second = %second, "edge added");
        self.adjacency
            .entry(first.clone())
            .or_default()
            .insert(key.clone());
        self.adjacency
            .entry(second.clone())
            .or_default()
            .insert(key.clone());
        let edge = self.edges.entry(key.clone()).or_insert(Edge {
            key,
            first: first.clone(),
            second: second.clone(),
            payload,
        });
        Ok(&*edge)
    }

    /// Remove a node and every edge incident to it.
    ///
    /// Returns `None` if the node does not exist.
    pub fn remove_node(&mut self, key: &NodeKey) -> Option<Node> {
        if !self.nodes.contains_key(key) {
            return None;
        }
        let incident: Vec<EdgeKey> = self.edges_of_node(key).cloned().collect();
        for edge in &incident {
            self.remove_edge(edge);
        }
        self.adjacency.remove(key);
        let node = self.nodes.remove(key);
        debug!(node = %key, cascaded = incident.len(), "node removed");
        node
    }

    /// Remove an edge.
    ///
    /// Returns `None` if the edge does not exist.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> Option<Edge> {
        let edge = self.edges.remove(key)?;
        for endpoint in [&edge.first, &edge.second] {
            if let Some(incident) = self.adjacency.get_mut(endpoint) {
                incident.remove(key);
            }
        }
        debug!(edge = %key, "edge removed");
        Some(edge)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Look up a node.
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Look up an edge.
    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    /// The edge connecting `a` and `b`, in either order.
    pub fn edge_between(&self, a: &NodeKey, b: &NodeKey) -> Option<&Edge> {
        self.edges.get(&EdgeKey::between(a, b))
    }

    /// Both endpoints of an edge, in insertion order.
    pub fn nodes_of_edge(&self, key: &EdgeKey) -> Option<(&NodeKey, &NodeKey)> {
        self.edges.get(key).map(|edge| (&edge.first, &edge.second))
    }

    /// Keys of the edges incident to a node. Empty if the node is unknown.
    pub fn edges_of_node(&self, key: &NodeKey) -> impl Iterator<Item = &EdgeKey> {
        self.adjacency.get(key).into_iter().flatten()
    }

    /// Whether the node exists.
    pub fn contains_node(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Whether the edge exists.
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// All node keys in key order.
    pub fn node_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    /// All nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges in key order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes (and therefore no edges).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(value: &str) -> NodeKey {
        NodeKey::from(value)
    }

    fn make_triangle() -> Graph {
        let mut graph = Graph::new();
        for _ in 0..3 {
            graph.add_node(Value::Null).unwrap();
        }
        graph.add_edge(&key("0"), &key("1"), Value::Null).unwrap();
        graph.add_edge(&key("1"), &key("2"), Value::Null).unwrap();
        graph.add_edge(&key("2"), &key("0"), Value::Null).unwrap();
        graph
    }

    #[test]
    fn add_and_query_nodes() {
        let mut graph = Graph::new();
        let first = graph.add_node(json!({"label": "a"})).unwrap().key.clone();
        let second = graph.add_node(Value::Null).unwrap().key.clone();

        assert_eq!(first.as_str(), "0");
        assert_eq!(second.as_str(), "1");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(&first).unwrap().payload, json!({"label": "a"}));
        assert!(graph.node(&key("7")).is_none());
    }

    #[test]
    fn edge_keeps_argument_order_and_symmetric_key() {
        let mut graph = Graph::new();
        graph.add_node(Value::Null).unwrap();
        graph.add_node(Value::Null).unwrap();

        let edge = graph.add_edge(&key("1"), &key("0"), Value::Null).unwrap();
        assert_eq!(edge.key.as_str(), "0-1");
        assert_eq!(edge.first, key("1"));
        assert_eq!(edge.second, key("0"));

        assert!(graph.edge_between(&key("0"), &key("1")).is_some());
        assert_eq!(
            graph.nodes_of_edge(&EdgeKey::from("0-1")),
            Some((&key("1"), &key("0")))
        );
    }

    #[test]
    fn duplicate_edge_rejected_in_either_order() {
        let mut graph = Graph::new();
        graph.add_node(Value::Null).unwrap();
        graph.add_node(Value::Null).unwrap();
        graph.add_edge(&key("0"), &key("1"), json!(1)).unwrap();

        let err = graph.add_edge(&key("1"), &key("0"), json!(2)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateEdge(EdgeKey::from("0-1")));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge(&EdgeKey::from("0-1")).unwrap().payload, json!(1));
    }

    #[test]
    fn edge_to_missing_node_rejected() {
        let mut graph = Graph::new();
        graph.add_node(Value::Null).unwrap();
        let err = graph.add_edge(&key("0"), &key("9"), Value::Null).unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound(key("9")));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.edges_of_node(&key("0")).count(), 0);
    }

    #[test]
    fn remove_node_cascades_incident_edges() {
        let mut graph = make_triangle();
        let removed = graph.remove_node(&key("0")).unwrap();

        assert_eq!(removed.key, key("0"));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains_edge(&EdgeKey::from("1-2")));
        for edge in graph.edges() {
            assert!(graph.contains_node(&edge.first));
            assert!(graph.contains_node(&edge.second));
        }
        assert_eq!(graph.edges_of_node(&key("1")).count(), 1);
    }

    #[test]
    fn remove_missing_entities_is_not_an_error() {
        let mut graph = make_triangle();
        assert!(graph.remove_node(&key("42")).is_none());
        assert!(graph.remove_edge(&EdgeKey::from("0-42")).is_none());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn self_edge_is_indexed_once() {
        let mut graph = Graph::new();
        graph.add_node(Value::Null).unwrap();
        graph.add_edge(&key("0"), &key("0"), Value::Null).unwrap();
        assert_eq!(graph.edges_of_node(&key("0")).count(), 1);
        graph.remove_node(&key("0"));
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn keys_are_never_reused() {
        let mut graph = Graph::new();
        graph.add_node(Value::Null).unwrap();
        graph.remove_node(&key("0"));
        let next = graph.add_node(Value::Null).unwrap().key.clone();
        assert_eq!(next.as_str(), "1");
    }

    #[test]
    fn shared_allocator_spans_graphs() {
        let allocator = KeyAllocator::new();
        let mut first = Graph::with_allocator(allocator.clone());
        first.add_node(Value::Null).unwrap();
        first.add_node(Value::Null).unwrap();

        let mut second = Graph::with_allocator(allocator.clone());
        let third = second.add_node(Value::Null).unwrap().key.clone();
        assert_eq!(third.as_str(), "2");
        assert_eq!(allocator.peek(), 3);
    }

    #[test]
    fn exhausted_allocator_reports_error() {
        let mut graph = Graph::with_allocator(KeyAllocator::starting_at(u64::MAX));
        let err = graph.add_node(Value::Null).unwrap_err();
        assert_eq!(err, GraphError::KeySpaceExhausted);
        assert!(graph.is_empty());
    }
}
