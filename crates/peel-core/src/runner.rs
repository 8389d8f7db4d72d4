//! Frame loop runner with external controls.
//!
//! [`run_frames`] drives [`GraphEngine::update`] once per frame and wraps it
//! with the control plane from [`FrameControl`]:
//!
//! - **Bounded runs**: stop after `max_frames` or `max_real_time_seconds`
//! - **Pause/resume** between frames
//! - **Variable frame rate**, adjustable while running
//! - **Restart requests**, executed between frames
//! - **Stop requests** from any task holding the control block
//!
//! The engine is not `Send`; run the loop on a current-thread runtime.

use std::sync::Arc;

use tracing::{info, warn};

use crate::control::{FrameControl, RunEndReason};
use crate::engine::{EngineError, FrameSummary, GraphEngine, LoopState};

/// Errors that end the frame loop early.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The engine failed outside of an isolated system update.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },
}

/// Result of a frame loop run.
#[derive(Debug)]
pub struct RunResult {
    /// Why the loop ended.
    pub end_reason: RunEndReason,
    /// The last frame summary, if any frame ran.
    pub final_summary: Option<FrameSummary>,
    /// Frames run by this call.
    pub total_frames: u64,
    /// Engine restarts executed by this call.
    pub restarts: u64,
}

/// Callback invoked after each frame.
pub trait FrameCallback {
    /// Called after a frame completes.
    fn on_frame(&mut self, summary: &FrameSummary, engine: &GraphEngine);
}

/// A frame callback that does nothing.
pub struct NoOpCallback;

impl FrameCallback for NoOpCallback {
    fn on_frame(&mut self, _summary: &FrameSummary, _engine: &GraphEngine) {}
}

/// Run frames until a termination condition is met.
///
/// The engine's loop state is `Running` for the duration of the call and
/// `Idle` afterwards, whatever the outcome.
///
/// # Errors
///
/// Returns [`RunnerError`] if the frame clock overflows or a requested
/// restart fails.
pub async fn run_frames(
    engine: &mut GraphEngine,
    control: &Arc<FrameControl>,
    callback: &mut dyn FrameCallback,
) -> Result<RunResult, RunnerError> {
    info!(
        max_frames = control.max_frames(),
        frame_interval_ms = control.frame_interval_ms(),
        generation = engine.generation(),
        "Frame loop starting"
    );

    engine.set_loop_state(LoopState::Running);
    let result = drive(engine, control, callback).await;
    engine.set_loop_state(LoopState::Idle);
    result
}

async fn drive(
    engine: &mut GraphEngine,
    control: &Arc<FrameControl>,
    callback: &mut dyn FrameCallback,
) -> Result<RunResult, RunnerError> {
    let mut last_summary: Option<FrameSummary> = None;
    let mut total_frames: u64 = 0;
    let mut restarts: u64 = 0;

    let end_reason = loop {
        if control.is_paused() {
            info!(frame = engine.frame(), "Frame loop paused");
            control.wait_if_paused().await;
            info!(frame = engine.frame(), "Frame loop resumed");
        }

        if control.is_stop_requested() {
            info!(frame = engine.frame(), "Stop requested");
            break RunEndReason::OperatorStop;
        }

        if control.time_limit_reached() {
            info!(elapsed = control.elapsed_seconds(), "Real-time limit reached");
            break RunEndReason::MaxRealTimeReached;
        }

        if control.take_restart_request() {
            engine.restart()?;
            restarts = restarts.saturating_add(1);
        }

        let summary = engine.update()?;
        total_frames = total_frames.saturating_add(1);
        callback.on_frame(&summary, engine);
        last_summary = Some(summary);

        if control.frame_limit_reached(total_frames) {
            info!(total_frames, "Frame limit reached");
            break RunEndReason::MaxFramesReached;
        }

        let interval_ms = control.frame_interval_ms();
        tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
    };

    control.set_end_reason(end_reason).await;
    Ok(RunResult {
        end_reason,
        final_summary: last_summary,
        total_frames,
        restarts,
    })
}

/// Log how a frame loop run ended.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_frames = result.total_frames,
        restarts = result.restarts,
        final_frame = result.final_summary.as_ref().map(|s| s.frame),
        "Frame loop ended"
    );

    if let Some(ref summary) = result.final_summary {
        if !summary.failures.is_empty() {
            warn!(
                frame = summary.frame,
                failures = summary.failures.len(),
                "Final frame had failing systems"
            );
        }
    } else {
        warn!("Frame loop ended with no frames executed");
    }
}
