//! Frame callback that logs graph and layout state.

use peel_core::engine::{FrameSummary, GraphEngine};
use peel_core::layout::LayoutSystem;
use peel_core::runner::FrameCallback;
use peel_core::system::SystemHandle;
use peel_events::GraphAccess;
use tracing::{debug, info};

/// Logs a one-line summary every `every` frames and each frame at debug.
pub struct FrameLog {
    layout: SystemHandle<LayoutSystem>,
    every: u64,
}

impl FrameLog {
    /// Create a callback that reports every `every` frames.
    pub fn new(layout: SystemHandle<LayoutSystem>, every: u64) -> Self {
        Self {
            layout,
            every: every.max(1),
        }
    }
}

impl FrameCallback for FrameLog {
    fn on_frame(&mut self, summary: &FrameSummary, engine: &GraphEngine) {
        debug!(
            frame = summary.frame,
            updated = summary.updated,
            failures = summary.failures.len(),
            "Frame complete"
        );
        if summary.frame.checked_rem(self.every) != Some(0) {
            return;
        }
        let (layers, redraws) = self
            .layout
            .with(|l| (l.hulls().layer_count(), l.redraw_count()))
            .unwrap_or_default();
        info!(
            frame = summary.frame,
            nodes = engine.stream().node_count(),
            edges = engine.stream().edge_count(),
            hull_layers = layers,
            redraws,
            "Frame report"
        );
    }
}
