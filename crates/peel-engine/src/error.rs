//! Error types for the Peel engine binary.
//!
//! [`AppError`] wraps every failure mode of startup and the demo run so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: peel_core::config::ConfigError,
    },

    /// The engine or one of its systems failed.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: peel_core::engine::EngineError,
    },

    /// The frame loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: peel_core::runner::RunnerError,
    },

    /// Opening the snapshot store or saving failed.
    #[error("persistence error: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: peel_core::persist::PersistError,
    },

    /// Placing a node failed.
    #[error("layout error: {source}")]
    Layout {
        /// The underlying layout error.
        #[from]
        source: peel_core::layout::LayoutError,
    },

    /// The scatter section could not be read.
    #[error("scatter error: {message}")]
    Scatter {
        /// Description of the failure.
        message: String,
    },
}
