//! The subsystem contract and typed handles.
//!
//! A [`GraphSystem`] is an independently updating component that reacts to
//! graph events and may mutate the graph through the [`DispatchAdapter`] it
//! receives on start. The engine owns every registered system inside a
//! [`SinkCell`]; callers keep a [`SystemHandle`] to reach their own system
//! without any name-based lookup.

use std::fmt;
use std::rc::Rc;

use peel_events::{DispatchAdapter, EventSink, SinkCell, StreamError};
use peel_types::SubscriberId;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::layout::LayoutError;
use crate::persist::PersistError;

/// Errors raised by subsystem lifecycle hooks and event handlers.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A graph mutation made by the system failed.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// The layout system failed.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// The persistence system failed.
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Any other failure, described in text.
    #[error("{0}")]
    Message(String),
}

/// Lifecycle position of a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    /// Built but not yet initialized.
    Constructed,
    /// `init` succeeded.
    Initialized,
    /// Bound to the current stream and receiving events.
    Started,
    /// Stopped; receives nothing until restarted.
    Stopped,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constructed => "constructed",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// An engine subsystem.
///
/// Event handlers come from [`EventSink`]; they only ever see events the
/// system did not emit itself.
pub trait GraphSystem: EventSink<Error = SystemError> {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// One-time setup before the first start.
    fn init(&mut self) -> Result<(), SystemError> {
        Ok(())
    }

    /// Begin working against a stream. The adapter is the system's only way
    /// to mutate the graph.
    fn start(&mut self, adapter: DispatchAdapter) -> Result<(), SystemError>;

    /// Stop working; the current stream is about to be discarded or the
    /// engine is shutting down.
    fn stop(&mut self) {}

    /// Called once per frame while started.
    fn update(&mut self) -> Result<(), SystemError> {
        Ok(())
    }

    /// Move to a fresh stream.
    fn restart(&mut self, adapter: DispatchAdapter) -> Result<(), SystemError> {
        self.stop();
        self.start(adapter)
    }
}

/// Typed access to a registered system.
pub struct SystemHandle<S> {
    name: &'static str,
    cell: Rc<SinkCell<S>>,
}

impl<S> Clone for SystemHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<S> fmt::Debug for SystemHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<S: GraphSystem> SystemHandle<S> {
    pub(crate) const fn new(name: &'static str, cell: Rc<SinkCell<S>>) -> Self {
        Self { name, cell }
    }

    /// The system's subscriber id (the emitter of its own mutations).
    pub fn id(&self) -> SubscriberId {
        self.cell.id()
    }

    /// The system's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Run `f` with exclusive access to the system. Events that arrive for
    /// the system while `f` runs are delivered right after it returns.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SystemBusy`] if the system is already borrowed
    /// further up the call stack (for example from inside its own handler).
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, EngineError> {
        self.cell
            .with_mut(f)
            .map_err(|source| EngineError::SystemBusy {
                name: self.name,
                source,
            })
    }
}
