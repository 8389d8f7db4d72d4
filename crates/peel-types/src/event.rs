//! Graph mutation events.
//!
//! Every successful mutation of the graph produces exactly one
//! [`GraphEvent`], broadcast synchronously to all listeners. The event
//! carries only the key of the affected entity; listeners read the current
//! state from the graph if they need more.

use core::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::SubscriberId;

/// The kind of mutation an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum GraphEventKind {
    /// A node was added.
    NodeAdded,
    /// A node was removed (after all of its edges).
    NodeRemoved,
    /// An edge was added.
    EdgeAdded,
    /// An edge was removed.
    EdgeRemoved,
}

impl GraphEventKind {
    /// Whether the event concerns a node (as opposed to an edge).
    pub const fn is_node(self) -> bool {
        matches!(self, Self::NodeAdded | Self::NodeRemoved)
    }

    /// Whether the event reports an addition.
    pub const fn is_addition(self) -> bool {
        matches!(self, Self::NodeAdded | Self::EdgeAdded)
    }
}

impl fmt::Display for GraphEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NodeAdded => "node_added",
            Self::NodeRemoved => "node_removed",
            Self::EdgeAdded => "edge_added",
            Self::EdgeRemoved => "edge_removed",
        };
        f.write_str(name)
    }
}

/// Who a mutation is attributed to.
///
/// Subsystems never receive events they emitted themselves through their own
/// dispatch adapter; everything else reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Emitter {
    /// The event stream itself (direct calls on the stream).
    Stream,
    /// A subsystem, through its dispatch adapter.
    Subscriber(SubscriberId),
}

impl fmt::Display for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Subscriber(id) => write!(f, "subscriber:{id}"),
        }
    }
}

/// A single graph mutation notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphEvent {
    /// What happened.
    pub kind: GraphEventKind,
    /// Key of the node or edge concerned.
    pub key: String,
    /// Who made the mutation.
    pub emitter: Emitter,
}

impl GraphEvent {
    /// Create a new event.
    pub fn new(kind: GraphEventKind, key: impl Into<String>, emitter: Emitter) -> Self {
        Self {
            kind,
            key: key.into(),
            emitter,
        }
    }
}
