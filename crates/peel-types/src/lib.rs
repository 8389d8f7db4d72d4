//! Shared type definitions for the Peel graph editor core.
//!
//! This crate is the single source of truth for the identifiers, events and
//! geometry used across the workspace. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` so the external renderer sees the same shapes.
//!
//! # Modules
//!
//! - [`ids`] -- Node keys, derived edge keys, and subscriber identifiers
//! - [`event`] -- Graph mutation events and emitter identity
//! - [`geometry`] -- 2D points with the cross product and distance helpers

pub mod event;
pub mod geometry;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use event::{Emitter, GraphEvent, GraphEventKind};
pub use geometry::Point;
pub use ids::{EDGE_KEY_SEPARATOR, EdgeKey, NodeKey, SubscriberId};
