//! Named key/blob stores.
//!
//! A store holds any number of named sub-stores, each a map from string keys
//! to JSON blobs. Blobs are kept as JSON text, so what is read back is
//! exactly what was written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::error::PersistError;

/// Storage backend for snapshots.
pub trait Store {
    /// Write `blob` under `key` in the named store.
    fn put(&mut self, store: &str, key: &str, blob: &Value) -> Result<(), PersistError>;

    /// Read the blob under `key`, if any.
    fn get(&self, store: &str, key: &str) -> Result<Option<Value>, PersistError>;

    /// Delete the blob under `key`. `Ok(false)` if there was none.
    fn remove(&mut self, store: &str, key: &str) -> Result<bool, PersistError>;

    /// Delete every blob in the named store.
    fn clear(&mut self, store: &str) -> Result<(), PersistError>;

    /// Make every write so far durable.
    fn flush(&mut self) -> Result<(), PersistError>;
}

/// Keeps every store in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    stores: BTreeMap<String, BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw JSON text of a blob.
    pub fn raw(&self, store: &str, key: &str) -> Option<&str> {
        self.stores.get(store)?.get(key).map(String::as_str)
    }

    /// Names of the stores holding at least one blob.
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, _)| name.as_str())
    }
}

impl Store for MemoryStore {
    fn put(&mut self, store: &str, key: &str, blob: &Value) -> Result<(), PersistError> {
        let text = serde_json::to_string(blob)?;
        self.stores
            .entry(store.to_owned())
            .or_default()
            .insert(key.to_owned(), text);
        Ok(())
    }

    fn get(&self, store: &str, key: &str) -> Result<Option<Value>, PersistError> {
        self.raw(store, key)
            .map(serde_json::from_str)
            .transpose()
            .map_err(PersistError::from)
    }

    fn remove(&mut self, store: &str, key: &str) -> Result<bool, PersistError> {
        Ok(self
            .stores
            .get_mut(store)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    fn clear(&mut self, store: &str) -> Result<(), PersistError> {
        if let Some(entries) = self.stores.get_mut(store) {
            entries.clear();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PersistError> {
        Ok(())
    }
}

/// One `<directory>/<store>.json` file per named store.
///
/// Reads are served from memory; files are rewritten on [`Store::flush`].
#[derive(Debug)]
pub struct JsonFileStore {
    directory: PathBuf,
    memory: MemoryStore,
    dirty: BTreeSet<String>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store directory and load its files.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if the directory cannot be created or
    /// read, or [`PersistError::Serialization`] if a store file is not a
    /// JSON object of strings.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, PersistError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        let mut memory = MemoryStore::new();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let entries: BTreeMap<String, String> =
                serde_json::from_str(&fs::read_to_string(&path)?)?;
            memory.stores.insert(name.to_owned(), entries);
        }

        info!(
            directory = %directory.display(),
            stores = memory.stores.len(),
            "file store opened"
        );
        Ok(Self {
            directory,
            memory,
            dirty: BTreeSet::new(),
        })
    }

    /// The directory holding the store files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_of(&self, store: &str) -> PathBuf {
        self.directory.join(format!("{store}.json"))
    }
}

impl Store for JsonFileStore {
    fn put(&mut self, store: &str, key: &str, blob: &Value) -> Result<(), PersistError> {
        self.memory.put(store, key, blob)?;
        self.dirty.insert(store.to_owned());
        Ok(())
    }

    fn get(&self, store: &str, key: &str) -> Result<Option<Value>, PersistError> {
        self.memory.get(store, key)
    }

    fn remove(&mut self, store: &str, key: &str) -> Result<bool, PersistError> {
        let removed = self.memory.remove(store, key)?;
        if removed {
            self.dirty.insert(store.to_owned());
        }
        Ok(removed)
    }

    fn clear(&mut self, store: &str) -> Result<(), PersistError> {
        self.memory.clear(store)?;
        self.dirty.insert(store.to_owned());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PersistError> {
        let empty = BTreeMap::new();
        for store in std::mem::take(&mut self.dirty) {
            let entries = self.memory.stores.get(&store).unwrap_or(&empty);
            fs::write(self.path_of(&store), serde_json::to_string_pretty(entries)?)?;
            debug!(store, entries = entries.len(), "store file written");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "peel-store-{name}-{}",
            uuid_suffix()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn uuid_suffix() -> String {
        peel_types::SubscriberId::new().to_string()
    }

    #[test]
    fn memory_store_keeps_exact_text() {
        let mut store = MemoryStore::new();
        store
            .put("layout", "0", &json!({"x": 1.5, "y": -2.0, "color": "white"}))
            .unwrap();

        assert_eq!(
            store.raw("layout", "0"),
            Some(r#"{"color":"white","x":1.5,"y":-2.0}"#)
        );
        assert_eq!(
            store.get("layout", "0").unwrap(),
            Some(json!({"x": 1.5, "y": -2.0, "color": "white"}))
        );
        assert_eq!(store.get("layout", "1").unwrap(), None);
        assert_eq!(store.get("missing", "0").unwrap(), None);
    }

    #[test]
    fn memory_store_remove_and_clear() {
        let mut store = MemoryStore::new();
        store.put("s", "a", &json!(1)).unwrap();
        store.put("s", "b", &json!(2)).unwrap();

        assert!(store.remove("s", "a").unwrap());
        assert!(!store.remove("s", "a").unwrap());
        store.clear("s").unwrap();
        assert_eq!(store.get("s", "b").unwrap(), None);
        assert_eq!(store.store_names().count(), 0);
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let dir = scratch_dir("round-trip");
        {
            let mut store = JsonFileStore::open(&dir).unwrap();
            store.put("nodes_db", "nodes", &json!(["0", "1"])).unwrap();
            store.put("history", "history", &json!(["added: 1"])).unwrap();
            store.flush().unwrap();
        }
        assert!(dir.join("nodes_db.json").exists());

        let reopened = JsonFileStore::open(&dir).unwrap();
        assert_eq!(
            reopened.get("nodes_db", "nodes").unwrap(),
            Some(json!(["0", "1"]))
        );
        assert_eq!(
            reopened.get("history", "history").unwrap(),
            Some(json!(["added: 1"]))
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cleared_store_is_written_empty() {
        let dir = scratch_dir("clear");
        let mut store = JsonFileStore::open(&dir).unwrap();
        store.put("edges_db", "edges", &json!([])).unwrap();
        store.flush().unwrap();
        store.clear("edges_db").unwrap();
        store.flush().unwrap();

        let reopened = JsonFileStore::open(&dir).unwrap();
        assert_eq!(reopened.get("edges_db", "edges").unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
