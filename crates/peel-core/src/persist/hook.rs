//! The contract subsystems implement to take part in save and load.

use peel_types::{EdgeKey, NodeKey};
use serde_json::Value;

use super::error::PersistError;

/// Saves and restores one subsystem's per-node, per-edge and global data.
///
/// Blobs are stored in a store named after the hook: node and edge blobs
/// under the entity key at save time, the system blob under the hook name.
/// On load, node and edge restores receive the entity's new key together
/// with whatever was saved under its old key.
pub trait PersistenceHook {
    /// Hook name; also the name of the store its blobs go to.
    fn name(&self) -> &str;

    /// Data to save for a node. `Ok(None)` saves nothing.
    fn serialize_node(&self, key: &NodeKey) -> Result<Option<Value>, PersistError>;

    /// Data to save for an edge. `Ok(None)` saves nothing.
    fn serialize_edge(&self, key: &EdgeKey) -> Result<Option<Value>, PersistError>;

    /// Global data to save. `Ok(None)` saves nothing.
    fn serialize_system(&self) -> Result<Option<Value>, PersistError>;

    /// Restore a node now known as `key`.
    ///
    /// # Errors
    ///
    /// [`PersistError::InvariantBroken`] if `data` is missing or unusable
    /// and the hook needs it.
    fn deserialize_node(&mut self, key: &NodeKey, data: Option<Value>) -> Result<(), PersistError>;

    /// Restore an edge now known as `key`.
    ///
    /// # Errors
    ///
    /// [`PersistError::InvariantBroken`] if `data` is missing or unusable
    /// and the hook needs it.
    fn deserialize_edge(&mut self, key: &EdgeKey, data: Option<Value>) -> Result<(), PersistError>;

    /// Restore global data. Runs after every node and edge restore.
    ///
    /// # Errors
    ///
    /// [`PersistError::InvariantBroken`] if `data` is missing or unusable
    /// and the hook needs it.
    fn deserialize_system(&mut self, data: Option<Value>) -> Result<(), PersistError>;

    /// Forget whatever a failed load restored. Runs after the engine has
    /// discarded the partially rebuilt graph.
    fn reset(&mut self) -> Result<(), PersistError> {
        Ok(())
    }
}
