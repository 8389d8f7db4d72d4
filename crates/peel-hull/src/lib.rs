//! Layered convex hulls for the Peel editor core.
//!
//! [`HullLayers::compute`] peels a point set into nested rings: the convex
//! hull of all points, then the hull of what remains, and so on, until every
//! point belongs to exactly one ring. The result is pure data; turning ring
//! links into graph edges is left to the caller.
//!
//! # Modules
//!
//! - [`layers`] -- [`HullLayers`] and the gift-wrapping pass.

pub mod layers;

pub use layers::HullLayers;
