//! Event stream and subscriber dispatch for the Peel editor core.
//!
//! Every graph mutation goes through an [`EventStream`], which applies it to
//! the graph store and then broadcasts a [`GraphEvent`] synchronously to its
//! listeners. Subsystems never register raw listeners; they are wrapped in a
//! [`SinkCell`] and connected through a [`DispatchAdapter`], which filters
//! out the subsystem's own mutations and queues re-entrant deliveries.
//!
//! # Modules
//!
//! - [`access`] -- [`GraphAccess`], the read/write surface shared by streams
//!   and adapters.
//! - [`dispatch`] -- [`EventSink`], [`SinkCell`] and [`DispatchAdapter`].
//! - [`error`] -- Error types for stream mutations and subscriber access.
//! - [`stream`] -- [`EventStream`] and its listener registries.
//!
//! [`GraphEvent`]: peel_types::GraphEvent

pub mod access;
pub mod dispatch;
pub mod error;
pub mod stream;

// Re-export primary types at crate root.
pub use access::GraphAccess;
pub use dispatch::{DispatchAdapter, EventSink, Phase, SinkCell};
pub use error::{DispatchError, StreamError};
pub use stream::{EventStream, ListenerId};
