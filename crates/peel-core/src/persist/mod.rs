//! Saving and loading graphs.
//!
//! - [`store`] -- the [`Store`] trait with in-memory and JSON-file backends.
//! - [`hook`] -- the [`PersistenceHook`] contract for subsystem data.
//! - [`hooks`] -- hooks for the layout and history subsystems.
//! - [`snapshot`] -- the [`PersistenceSystem`] and [`load`].

pub mod error;
pub mod hook;
pub mod hooks;
pub mod snapshot;
pub mod store;

pub use error::PersistError;
pub use hook::PersistenceHook;
pub use hooks::{HistoryHook, LayoutHook};
pub use snapshot::{EdgeRecord, LoadReport, PersistenceSystem, SaveReport, Snapshot, load};
pub use store::{JsonFileStore, MemoryStore, Store};
