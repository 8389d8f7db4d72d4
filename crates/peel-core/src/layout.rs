//! Node placement and hull edges.
//!
//! [`LayoutSystem`] owns every node's position and color and keeps one edge
//! per link of the nested convex hulls over those positions. Positions are
//! layout state, not graph state: the graph only sees the hull edges being
//! added and removed.

use std::collections::{BTreeMap, BTreeSet};

use peel_events::{DispatchAdapter, EventSink, GraphAccess, StreamError};
use peel_hull::HullLayers;
use peel_types::{EdgeKey, GraphEvent, GraphEventKind, NodeKey, Point};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::LayoutConfig;
use crate::system::{GraphSystem, SystemError};

/// Errors returned by layout operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// A graph mutation failed.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// The layout system has no stream to work against.
    #[error("layout system is not started")]
    NotStarted,

    /// The node has no placement.
    #[error("node {0} has no placement")]
    UnknownNode(NodeKey),

    /// The edge is not tracked by the layout.
    #[error("edge {0} is not tracked by the layout")]
    UnknownEdge(EdgeKey),
}

/// Where and how a node is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Position in layout space.
    pub position: Point,
    /// Fill color.
    pub color: String,
}

/// Edges changed by one hull recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HullDiff {
    /// Hull edges that were added.
    pub added: Vec<EdgeKey>,
    /// Hull edges that were removed.
    pub removed: Vec<EdgeKey>,
    /// Number of hull rings after the recomputation.
    pub layers: usize,
}

/// The layout subsystem.
#[derive(Debug)]
pub struct LayoutSystem {
    config: LayoutConfig,
    adapter: Option<DispatchAdapter>,
    placements: BTreeMap<NodeKey, Placement>,
    edge_colors: BTreeMap<EdgeKey, String>,
    hulls: HullLayers<NodeKey>,
    needs_redraw: bool,
    redraws: u64,
}

impl LayoutSystem {
    /// Create a layout system.
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            adapter: None,
            placements: BTreeMap::new(),
            edge_colors: BTreeMap::new(),
            hulls: HullLayers::default(),
            needs_redraw: false,
            redraws: 0,
        }
    }

    fn adapter(&self) -> Result<&DispatchAdapter, LayoutError> {
        self.adapter.as_ref().ok_or(LayoutError::NotStarted)
    }

    // -------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------

    /// Add a node at `position` and recompute the hulls.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotStarted`] before start, or
    /// [`LayoutError::Stream`] if the graph rejects a mutation.
    pub fn place_node(&mut self, position: Point) -> Result<NodeKey, LayoutError> {
        let node = self.adapter()?.add_node(Value::Null)?;
        self.placements.insert(
            node.key.clone(),
            Placement {
                position,
                color: self.config.node_color.clone(),
            },
        );
        self.recompute_hulls()?;
        Ok(node.key)
    }

    /// Remove a node with its edges and recompute the hulls. `Ok(false)` if
    /// the node did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotStarted`] before start, or
    /// [`LayoutError::Stream`] if the graph rejects a mutation.
    pub fn remove_node(&mut self, key: &NodeKey) -> Result<bool, LayoutError> {
        let adapter = self.adapter()?;
        let incident = adapter.edges_of_node(key);
        if !adapter.remove_node(key)? {
            return Ok(false);
        }
        for edge in &incident {
            self.edge_colors.remove(edge);
        }
        self.placements.remove(key);
        self.recompute_hulls()?;
        Ok(true)
    }

    /// Connect two nodes with a user edge.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Stream`] wrapping the graph's duplicate edge or
    /// missing node error.
    pub fn connect(&mut self, first: &NodeKey, second: &NodeKey) -> Result<EdgeKey, LayoutError> {
        let edge = self.adapter()?.add_edge(first, second, Value::Null)?;
        self.edge_colors
            .insert(edge.key.clone(), self.config.edge_color.clone());
        self.needs_redraw = true;
        Ok(edge.key)
    }

    /// Remove an edge. `Ok(false)` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotStarted`] before start, or
    /// [`LayoutError::Stream`] if the graph is busy.
    pub fn disconnect(&mut self, key: &EdgeKey) -> Result<bool, LayoutError> {
        let removed = self.adapter()?.remove_edge(key)?;
        if removed {
            self.edge_colors.remove(key);
            self.needs_redraw = true;
        }
        Ok(removed)
    }

    /// Move a node during a drag. Hulls are left alone until
    /// [`Self::finish_drag`].
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownNode`] if the node has no placement.
    pub fn drag_to(&mut self, key: &NodeKey, position: Point) -> Result<(), LayoutError> {
        let placement = self
            .placements
            .get_mut(key)
            .ok_or_else(|| LayoutError::UnknownNode(key.clone()))?;
        placement.position = position;
        self.needs_redraw = true;
        Ok(())
    }

    /// End a drag and recompute the hulls.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownNode`] if the node has no placement, or
    /// any error from [`Self::recompute_hulls`].
    pub fn finish_drag(&mut self, key: &NodeKey) -> Result<HullDiff, LayoutError> {
        if !self.placements.contains_key(key) {
            return Err(LayoutError::UnknownNode(key.clone()));
        }
        self.recompute_hulls()
    }

    /// Recompute the hull layers and bring the hull edges in line with them.
    ///
    /// Edges for links that disappeared are removed if still present; edges
    /// for new links are added if absent. Does nothing when hulls are
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotStarted`] before start, or
    /// [`LayoutError::Stream`] if the graph rejects a mutation.
    pub fn recompute_hulls(&mut self) -> Result<HullDiff, LayoutError> {
        if !self.config.hull_enabled {
            return Ok(HullDiff::default());
        }
        let adapter = self.adapter()?.clone();

        let previous = link_keys(&self.hulls);
        self.hulls = HullLayers::compute(
            self.placements
                .iter()
                .map(|(key, placement)| (key.clone(), placement.position)),
        );
        let current = link_keys(&self.hulls);

        let mut diff = HullDiff {
            layers: self.hulls.layer_count(),
            ..HullDiff::default()
        };
        for key in previous.keys().filter(|key| !current.contains_key(*key)) {
            if adapter.remove_edge(key)? {
                self.edge_colors.remove(key);
                diff.removed.push(key.clone());
            }
        }
        for (key, (first, second)) in &current {
            if adapter.contains_edge(key) {
                continue;
            }
            adapter.add_edge(first, second, Value::Null)?;
            self.edge_colors
                .insert(key.clone(), self.config.edge_color.clone());
            diff.added.push(key.clone());
        }

        self.needs_redraw = true;
        debug!(
            layers = diff.layers,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "hull edges updated"
        );
        Ok(diff)
    }

    // -------------------------------------------------------------------
    // Restore
    // -------------------------------------------------------------------

    /// Overwrite a node's placement with saved data.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownNode`] if the node is not in the graph.
    pub fn restore_placement(
        &mut self,
        key: &NodeKey,
        placement: Placement,
    ) -> Result<(), LayoutError> {
        if !self.adapter()?.contains_node(key) {
            return Err(LayoutError::UnknownNode(key.clone()));
        }
        self.placements.insert(key.clone(), placement);
        self.needs_redraw = true;
        Ok(())
    }

    /// Overwrite an edge's color with saved data.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownEdge`] if the edge is not in the graph.
    pub fn restore_edge_color(&mut self, key: &EdgeKey, color: String) -> Result<(), LayoutError> {
        if !self.adapter()?.contains_edge(key) {
            return Err(LayoutError::UnknownEdge(key.clone()));
        }
        self.edge_colors.insert(key.clone(), color);
        self.needs_redraw = true;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// A node's placement.
    pub fn placement(&self, key: &NodeKey) -> Option<&Placement> {
        self.placements.get(key)
    }

    /// A node's position.
    pub fn position(&self, key: &NodeKey) -> Option<Point> {
        self.placements.get(key).map(|placement| placement.position)
    }

    /// An edge's color.
    pub fn edge_color(&self, key: &EdgeKey) -> Option<&str> {
        self.edge_colors.get(key).map(String::as_str)
    }

    /// The current hull layers.
    pub const fn hulls(&self) -> &HullLayers<NodeKey> {
        &self.hulls
    }

    /// Number of frames on which something needed drawing.
    pub const fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Whether something changed since the last frame.
    pub const fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }
}

/// Hull links keyed by the edge each one maps to. Both directions of a
/// two-point ring collapse into one entry.
fn link_keys(hulls: &HullLayers<NodeKey>) -> BTreeMap<EdgeKey, (NodeKey, NodeKey)> {
    let mut seen = BTreeSet::new();
    hulls
        .links()
        .into_iter()
        .filter_map(|(from, to)| {
            let key = EdgeKey::between(&from, &to);
            seen.insert(key.clone()).then_some((key, (from, to)))
        })
        .collect()
}

impl EventSink for LayoutSystem {
    type Error = SystemError;

    fn on_event(&mut self, event: &GraphEvent) -> Result<(), SystemError> {
        match event.kind {
            GraphEventKind::NodeAdded => {
                self.placements
                    .entry(NodeKey::from(event.key.as_str()))
                    .or_insert_with(|| Placement {
                        position: Point::ORIGIN,
                        color: self.config.node_color.clone(),
                    });
            }
            GraphEventKind::NodeRemoved => {
                self.placements.remove(&NodeKey::from(event.key.as_str()));
            }
            GraphEventKind::EdgeAdded => {
                self.edge_colors
                    .entry(EdgeKey::from(event.key.as_str()))
                    .or_insert_with(|| self.config.edge_color.clone());
            }
            GraphEventKind::EdgeRemoved => {
                self.edge_colors.remove(&EdgeKey::from(event.key.as_str()));
            }
        }
        self.needs_redraw = true;
        Ok(())
    }
}

impl GraphSystem for LayoutSystem {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn start(&mut self, adapter: DispatchAdapter) -> Result<(), SystemError> {
        self.adapter = Some(adapter);
        self.needs_redraw = true;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            adapter.unbind();
        }
        self.placements.clear();
        self.edge_colors.clear();
        self.hulls = HullLayers::default();
        self.needs_redraw = false;
    }

    fn update(&mut self) -> Result<(), SystemError> {
        if self.needs_redraw {
            self.redraws = self.redraws.saturating_add(1);
            self.needs_redraw = false;
        }
        Ok(())
    }
}
