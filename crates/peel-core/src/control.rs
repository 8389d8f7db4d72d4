//! Shared control state for the frame loop.
//!
//! The frame loop runs on its own task; anything else holding the
//! [`FrameControl`] (a UI task, a signal handler, a test) can pause, resume,
//! stop, retime, or request a restart without touching the engine itself.
//! Hot-path reads are lock-free atomics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::FrameConfig;

/// Reason why the frame loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEndReason {
    /// Reached the configured `max_frames` limit.
    MaxFramesReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// Someone holding the control block asked the loop to stop.
    OperatorStop,
}

/// Frame loop control block, shared through an `Arc`.
#[derive(Debug)]
pub struct FrameControl {
    /// Whether the loop is paused.
    paused: AtomicBool,

    /// Wakes the loop when resumed.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Whether an engine restart has been requested.
    restart_requested: AtomicBool,

    /// Current frame interval in milliseconds.
    frame_interval_ms: AtomicU64,

    /// Wall-clock time the control block was created.
    started_at: DateTime<Utc>,

    /// Maximum number of frames (0 = unlimited).
    max_frames: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    max_real_time_seconds: u64,

    /// Reason the loop ended, if it has.
    end_reason: Mutex<Option<RunEndReason>>,
}

impl FrameControl {
    /// Create a control block from configuration.
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            frame_interval_ms: AtomicU64::new(config.frame_interval_ms.max(1)),
            started_at: Utc::now(),
            max_frames: config.max_frames,
            max_real_time_seconds: config.max_real_time_seconds,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the loop after the current frame.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the loop and wake it.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until the loop is no longer paused.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop / Restart
    // -----------------------------------------------------------------------

    /// Request a clean stop. Also wakes a paused loop so it can exit.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Request an engine restart before the next frame.
    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::Release);
    }

    /// Consume a pending restart request.
    pub fn take_restart_request(&self) -> bool {
        self.restart_requested.swap(false, Ordering::AcqRel)
    }

    /// Record the reason the loop ended.
    pub async fn set_end_reason(&self, reason: RunEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// The reason the loop ended, if it has.
    pub async fn end_reason(&self) -> Option<RunEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Frame rate
    // -----------------------------------------------------------------------

    /// Current frame interval in milliseconds.
    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms.load(Ordering::Acquire)
    }

    /// Set the frame interval. Returns the previous interval, or `None` if
    /// `ms` is zero.
    pub fn set_frame_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms == 0 {
            return None;
        }
        Some(self.frame_interval_ms.swap(ms, Ordering::AcqRel))
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Whether `frames` has reached a nonzero `max_frames`.
    pub const fn frame_limit_reached(&self, frames: u64) -> bool {
        self.max_frames > 0 && frames >= self.max_frames
    }

    /// Whether a nonzero wall-clock limit has elapsed.
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds > 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Seconds since the control block was created.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Configured frame limit.
    pub const fn max_frames(&self) -> u64 {
        self.max_frames
    }

    /// Snapshot of the control block for status reporting.
    pub async fn status(&self, frame: u64) -> RunStatus {
        RunStatus {
            frame,
            paused: self.is_paused(),
            stop_requested: self.is_stop_requested(),
            frame_interval_ms: self.frame_interval_ms(),
            elapsed_seconds: self.elapsed_seconds(),
            max_frames: self.max_frames,
            max_real_time_seconds: self.max_real_time_seconds,
            end_reason: self.end_reason().await,
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

/// Serializable status of the frame loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Last frame run.
    pub frame: u64,
    /// Whether the loop is paused.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Current frame interval in milliseconds.
    pub frame_interval_ms: u64,
    /// Seconds since start.
    pub elapsed_seconds: u64,
    /// Configured frame limit (0 = unlimited).
    pub max_frames: u64,
    /// Configured time limit (0 = unlimited).
    pub max_real_time_seconds: u64,
    /// Why the loop ended, if it has.
    pub end_reason: Option<RunEndReason>,
    /// RFC 3339 start timestamp.
    pub started_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded(max_frames: u64) -> FrameConfig {
        FrameConfig {
            max_frames,
            ..FrameConfig::default()
        }
    }

    #[test]
    fn initial_state_is_running() {
        let control = FrameControl::new(&FrameConfig::default());
        assert!(!control.is_paused());
        assert!(!control.is_stop_requested());
        assert!(!control.take_restart_request());
    }

    #[test]
    fn pause_and_resume() {
        let control = FrameControl::new(&FrameConfig::default());
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
    }

    #[test]
    fn restart_request_is_consumed_once() {
        let control = FrameControl::new(&FrameConfig::default());
        control.request_restart();
        assert!(control.take_restart_request());
        assert!(!control.take_restart_request());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let control = FrameControl::new(&FrameConfig::default());
        assert_eq!(control.set_frame_interval_ms(0), None);
        assert_eq!(control.frame_interval_ms(), 16);
        assert_eq!(control.set_frame_interval_ms(5), Some(16));
        assert_eq!(control.frame_interval_ms(), 5);
    }

    #[test]
    fn frame_limit() {
        assert!(!FrameControl::new(&bounded(0)).frame_limit_reached(1_000_000));
        let control = FrameControl::new(&bounded(10));
        assert!(!control.frame_limit_reached(9));
        assert!(control.frame_limit_reached(10));
    }

    #[test]
    fn time_limit_zero_means_unlimited() {
        let control = FrameControl::new(&FrameConfig::default());
        assert!(!control.time_limit_reached());
    }

    #[tokio::test]
    async fn status_reports_end_reason() {
        let control = FrameControl::new(&bounded(3));
        assert_eq!(control.status(0).await.end_reason, None);
        control.set_end_reason(RunEndReason::OperatorStop).await;
        let status = control.status(2).await;
        assert_eq!(status.frame, 2);
        assert_eq!(status.max_frames, 3);
        assert_eq!(status.end_reason, Some(RunEndReason::OperatorStop));
    }
}
