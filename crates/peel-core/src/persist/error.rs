//! Error types for saving and loading graphs.

use peel_events::StreamError;

use crate::layout::LayoutError;

/// Errors that can occur while saving or loading a graph snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Reading or writing a store file failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A blob could not be encoded or decoded.
    #[error("blob serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The named store holds no snapshot.
    #[error("nothing saved in store {store}")]
    NothingSaved {
        /// Name of the empty store.
        store: String,
    },

    /// The saved node and edge lists disagree with each other.
    #[error("corrupt snapshot: {reason}")]
    CorruptSnapshot {
        /// What is inconsistent.
        reason: String,
    },

    /// A hook was asked to restore an entity it has no valid data for.
    #[error("hook {hook} cannot restore {key}: {reason}")]
    InvariantBroken {
        /// Name of the hook.
        hook: String,
        /// Key of the entity being restored (new key), or the hook name for
        /// system data.
        key: String,
        /// What was wrong with the data.
        reason: String,
    },

    /// Rebuilding the graph failed.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// The layout system rejected restored data.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// The system behind a hook could not be reached.
    #[error("hook {hook} unavailable: {reason}")]
    HookUnavailable {
        /// Name of the hook.
        hook: String,
        /// Why the system could not be reached.
        reason: String,
    },

    /// The persistence system has no stream to work against.
    #[error("persistence system is not started")]
    NotStarted,
}
