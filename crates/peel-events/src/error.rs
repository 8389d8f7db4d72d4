//! Error types for the `peel-events` crate.

use peel_graph::GraphError;
use peel_types::SubscriberId;

/// Errors returned by mutations made through an event stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The graph store rejected the mutation; nothing was broadcast.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// The graph is borrowed by a reader further up the call stack.
    #[error("graph is borrowed and cannot be mutated right now")]
    GraphBusy,
}

/// Errors returned when accessing a subscriber held in a sink cell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The subscriber is already borrowed further up the call stack.
    #[error("subscriber {subscriber} is busy")]
    SinkBusy {
        /// The busy subscriber.
        subscriber: SubscriberId,
    },
}
