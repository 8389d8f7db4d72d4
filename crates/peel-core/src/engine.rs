//! The engine: event stream generations, subsystem registry, frame clock.
//!
//! [`GraphEngine`] is an explicit context object. It owns the key allocator,
//! the current [`EventStream`], every registered [`GraphSystem`] in
//! registration order, and the [`FrameClock`]. There is no global instance;
//! tests build as many independent engines as they like.
//!
//! # Lifecycle
//!
//! ```text
//! register: Constructed -> Initialized -> Started
//! update:   Started -> Started (once per frame)
//! restart:  Initialized | Started | Stopped -> Started
//!           (fresh stream, same key allocator)
//! stop:     Started -> Stopped
//! ```

use std::rc::Rc;

use peel_events::{DispatchAdapter, DispatchError, EventStream, SinkCell};
use peel_graph::KeyAllocator;
use peel_types::SubscriberId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{ClockError, FrameClock};
use crate::persist::PersistError;
use crate::system::{GraphSystem, SystemError, SystemHandle, SystemState};

/// Errors that can occur during engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A system lifecycle hook failed.
    #[error("system {name} failed: {source}")]
    System {
        /// Name of the failing system.
        name: &'static str,
        /// The underlying system error.
        source: SystemError,
    },

    /// A system was already borrowed when the engine needed it.
    #[error("system {name} is busy: {source}")]
    SystemBusy {
        /// Name of the busy system.
        name: &'static str,
        /// The underlying dispatch error.
        source: DispatchError,
    },

    /// The frame clock could not advance.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    /// Saving or loading the graph failed.
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    /// The stream generation counter cannot be advanced any further.
    #[error("stream generation counter exhausted")]
    GenerationExhausted,
}

/// Whether the frame loop is driving the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// No loop is running.
    #[default]
    Idle,
    /// The frame loop is running.
    Running,
    /// The loop was interrupted (for example by a restart in progress).
    Cancelled,
}

/// A system that failed during a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFailure {
    /// Name of the failing system.
    pub name: String,
    /// Rendered error.
    pub reason: String,
}

/// Outcome of one [`GraphEngine::update`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    /// Frame number that just ran.
    pub frame: u64,
    /// Number of systems whose update succeeded.
    pub updated: usize,
    /// Systems whose update failed or that were busy.
    pub failures: Vec<SystemFailure>,
}

/// Registry entry as reported by [`GraphEngine::systems`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// System name.
    pub name: String,
    /// Subscriber id of the system.
    pub id: SubscriberId,
    /// Current lifecycle state.
    pub state: SystemState,
}

/// Lifecycle calls the engine makes without knowing the concrete system type.
trait ErasedSystem {
    fn start_on(self: Rc<Self>, stream: &EventStream, name: &'static str) -> Result<(), EngineError>;
    fn restart_on(self: Rc<Self>, stream: &EventStream, name: &'static str)
    -> Result<(), EngineError>;
    fn stop(&self, name: &'static str) -> Result<(), EngineError>;
    fn update(&self, name: &'static str) -> Result<(), EngineError>;
}

fn run_on<S: GraphSystem>(
    cell: &SinkCell<S>,
    name: &'static str,
    f: impl FnOnce(&mut S) -> Result<(), SystemError>,
) -> Result<(), EngineError> {
    cell.with_mut(f)
        .map_err(|source| EngineError::SystemBusy { name, source })?
        .map_err(|source| EngineError::System { name, source })
}

impl<S: GraphSystem + 'static> ErasedSystem for SinkCell<S> {
    fn start_on(self: Rc<Self>, stream: &EventStream, name: &'static str) -> Result<(), EngineError> {
        let adapter = DispatchAdapter::bind(stream, &self);
        let binding = adapter.clone();
        run_on(&self, name, |system| system.start(adapter)).inspect_err(|_| binding.unbind())
    }

    fn restart_on(
        self: Rc<Self>,
        stream: &EventStream,
        name: &'static str,
    ) -> Result<(), EngineError> {
        let adapter = DispatchAdapter::bind(stream, &self);
        let binding = adapter.clone();
        run_on(&self, name, |system| system.restart(adapter)).inspect_err(|_| binding.unbind())
    }

    fn stop(&self, name: &'static str) -> Result<(), EngineError> {
        run_on(self, name, |system| {
            system.stop();
            Ok(())
        })
    }

    fn update(&self, name: &'static str) -> Result<(), EngineError> {
        run_on(self, name, S::update)
    }
}

struct Slot {
    name: &'static str,
    id: SubscriberId,
    state: SystemState,
    system: Rc<dyn ErasedSystem>,
}

/// The explicit engine context.
pub struct GraphEngine {
    /// Source of node keys, shared by every stream generation.
    allocator: KeyAllocator,
    /// The stream all systems are currently bound to.
    stream: EventStream,
    /// Generation number of `stream`.
    generation: u64,
    /// Registered systems in registration order.
    systems: Vec<Slot>,
    /// Frames run so far.
    clock: FrameClock,
    /// Whether the frame loop is driving the engine.
    loop_state: LoopState,
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("generation", &self.generation)
            .field("systems", &self.systems.len())
            .field("frame", &self.clock.frame())
            .field("loop_state", &self.loop_state)
            .finish_non_exhaustive()
    }
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphEngine {
    /// Create an engine with a fresh key allocator and an empty graph.
    pub fn new() -> Self {
        Self::with_allocator(KeyAllocator::new())
    }

    /// Create an engine drawing node keys from `allocator`.
    pub fn with_allocator(allocator: KeyAllocator) -> Self {
        let stream = EventStream::new(allocator.clone(), 0);
        Self {
            allocator,
            stream,
            generation: 0,
            systems: Vec::new(),
            clock: FrameClock::new(),
            loop_state: LoopState::Idle,
        }
    }

    /// Register a system: `init`, bind to the current stream, `start`.
    ///
    /// The system is listed by [`GraphEngine::systems`] from the moment it is
    /// constructed, so a failed registration stays visible in the state it
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::System`] if `init` or `start` fails. A system
    /// whose `init` failed stays `Constructed` and is never started; one
    /// whose `start` failed stays `Initialized` and is started again by the
    /// next [`GraphEngine::restart`].
    pub fn register<S: GraphSystem + 'static>(
        &mut self,
        system: S,
    ) -> Result<SystemHandle<S>, EngineError> {
        let name = system.name();
        let cell = Rc::new(SinkCell::new(system));
        let id = cell.id();
        let erased: Rc<dyn ErasedSystem> = Rc::clone(&cell) as Rc<dyn ErasedSystem>;
        let index = self.systems.len();
        self.systems.push(Slot {
            name,
            id,
            state: SystemState::Constructed,
            system: erased,
        });

        run_on(&cell, name, S::init)
            .inspect_err(|err| warn!(system = name, error = %err, "system init failed"))?;
        self.set_slot_state(index, SystemState::Initialized);

        Rc::clone(&cell)
            .start_on(&self.stream, name)
            .inspect_err(|err| warn!(system = name, error = %err, "system start failed"))?;
        self.set_slot_state(index, SystemState::Started);

        info!(
            system = name,
            subscriber = %id,
            generation = self.generation,
            "system registered"
        );
        Ok(SystemHandle::new(name, cell))
    }

    fn set_slot_state(&mut self, index: usize, state: SystemState) {
        if let Some(slot) = self.systems.get_mut(index) {
            slot.state = state;
        }
    }

    /// Run one frame: advance the clock and update every started system in
    /// registration order.
    ///
    /// A failing or busy system is logged and reported in the summary; the
    /// remaining systems still run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Clock`] if the frame counter is exhausted.
    pub fn update(&mut self) -> Result<FrameSummary, EngineError> {
        let frame = self.clock.advance()?;
        let mut summary = FrameSummary {
            frame,
            updated: 0,
            failures: Vec::new(),
        };
        for slot in &self.systems {
            if slot.state != SystemState::Started {
                continue;
            }
            match slot.system.update(slot.name) {
                Ok(()) => summary.updated = summary.updated.saturating_add(1),
                Err(err) => {
                    warn!(frame, system = slot.name, error = %err, "system update failed");
                    summary.failures.push(SystemFailure {
                        name: slot.name.to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Discard the graph and move every system to a fresh stream.
    ///
    /// Node keys keep counting from where the previous stream stopped. If
    /// the frame loop is running it is marked cancelled for the duration of
    /// the restart and resumed afterwards.
    ///
    /// # Errors
    ///
    /// Every system is restarted even if some fail; the first failure is
    /// returned and the failing systems are left stopped. Systems whose
    /// `init` failed are skipped.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        let was_running = self.loop_state == LoopState::Running;
        if was_running {
            self.loop_state = LoopState::Cancelled;
        }

        let generation = self
            .generation
            .checked_add(1)
            .ok_or(EngineError::GenerationExhausted)?;
        self.stream = EventStream::new(self.allocator.clone(), generation);
        self.generation = generation;

        let mut first_error = None;
        for slot in &mut self.systems {
            let system = Rc::clone(&slot.system);
            let outcome = match slot.state {
                SystemState::Constructed => continue,
                SystemState::Initialized => system.start_on(&self.stream, slot.name),
                SystemState::Started | SystemState::Stopped => {
                    system.restart_on(&self.stream, slot.name)
                }
            };
            match outcome {
                Ok(()) => slot.state = SystemState::Started,
                Err(err) => {
                    warn!(generation, system = slot.name, error = %err, "system restart failed");
                    slot.state = SystemState::Stopped;
                    first_error.get_or_insert(err);
                }
            }
        }

        if was_running {
            self.loop_state = LoopState::Running;
        }
        info!(
            generation,
            systems = self.systems.len(),
            next_key = self.allocator.peek(),
            "engine restarted"
        );
        first_error.map_or(Ok(()), Err)
    }

    /// Stop every started system.
    ///
    /// # Errors
    ///
    /// Every system is stopped even if some are busy; the first failure is
    /// returned.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let mut first_error = None;
        for slot in &mut self.systems {
            if slot.state != SystemState::Started {
                continue;
            }
            match slot.system.stop(slot.name) {
                Ok(()) => slot.state = SystemState::Stopped,
                Err(err) => {
                    warn!(system = slot.name, error = %err, "system stop failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        info!(systems = self.systems.len(), "engine stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// The stream systems are currently bound to.
    pub const fn stream(&self) -> &EventStream {
        &self.stream
    }

    /// Generation number of the current stream (0 until the first restart).
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of the last frame run.
    pub const fn frame(&self) -> u64 {
        self.clock.frame()
    }

    /// Whether the frame loop is driving the engine.
    pub const fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    /// Record the frame loop's state.
    pub const fn set_loop_state(&mut self, state: LoopState) {
        self.loop_state = state;
    }

    /// Registered systems in registration order.
    pub fn systems(&self) -> Vec<SystemInfo> {
        self.systems
            .iter()
            .map(|slot| SystemInfo {
                name: slot.name.to_owned(),
                id: slot.id,
                state: slot.state,
            })
            .collect()
    }
}
