//! Frame counter for the engine loop.
//!
//! The clock is the single source of truth for how many frames the engine
//! has run. It survives [`GraphEngine::restart`](crate::engine::GraphEngine::restart);
//! only a new engine starts again at frame 0.

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Frame counter would overflow.
    #[error("frame counter overflow: cannot advance beyond u64::MAX")]
    FrameOverflow,
}

/// Counts engine frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameClock {
    /// Number of the last frame run (0 before the first frame).
    frame: u64,
}

impl FrameClock {
    /// Create a clock at frame 0.
    pub const fn new() -> Self {
        Self { frame: 0 }
    }

    /// Create a clock at an explicit frame (useful for testing).
    pub const fn from_frame(frame: u64) -> Self {
        Self { frame }
    }

    /// Advance by one frame. Returns the new frame number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::FrameOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.frame = self.frame.checked_add(1).ok_or(ClockError::FrameOverflow)?;
        Ok(self.frame)
    }

    /// Return the current frame number.
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_frame_zero() {
        assert_eq!(FrameClock::new().frame(), 0);
    }

    #[test]
    fn clock_advances() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn clock_refuses_to_overflow() {
        let mut clock = FrameClock::from_frame(u64::MAX);
        assert_eq!(clock.advance(), Err(ClockError::FrameOverflow));
        assert_eq!(clock.frame(), u64::MAX);
    }
}
