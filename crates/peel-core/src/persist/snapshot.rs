//! Saving the graph to a store and loading it back.

use std::collections::{BTreeMap, BTreeSet};

use peel_events::{DispatchAdapter, EventSink, GraphAccess};
use peel_types::{EdgeKey, GraphEvent, NodeKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::error::PersistError;
use super::hook::PersistenceHook;
use super::store::{JsonFileStore, MemoryStore, Store};
use crate::config::PersistenceConfig;
use crate::engine::{EngineError, GraphEngine};
use crate::system::{GraphSystem, SystemError, SystemHandle};

/// Key of the node list inside the nodes store.
pub const NODES_KEY: &str = "nodes";

/// Key of the edge list inside the edges store.
pub const EDGES_KEY: &str = "edges";

/// How an edge is saved: its key and both endpoints, by old node key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Edge key at save time.
    pub key: EdgeKey,
    /// First endpoint.
    pub from: NodeKey,
    /// Second endpoint.
    pub to: NodeKey,
}

/// What a save wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Nodes saved.
    pub nodes: usize,
    /// Edges saved.
    pub edges: usize,
    /// Hook blobs written, over all hooks.
    pub blobs: usize,
}

/// What a load restored, as old-key to new-key maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Saved node key to restored node key.
    pub nodes: BTreeMap<NodeKey, NodeKey>,
    /// Saved edge key to restored edge key.
    pub edges: BTreeMap<EdgeKey, EdgeKey>,
}

/// One hook's saved blobs, aligned with the snapshot's node and edge lists.
#[derive(Debug, Clone, Default)]
struct HookData {
    nodes: Vec<Option<Value>>,
    edges: Vec<Option<Value>>,
    system: Option<Value>,
}

/// Everything a load needs, read and checked before the graph is touched.
#[derive(Debug, Clone)]
pub struct Snapshot {
    nodes: Vec<NodeKey>,
    edges: Vec<EdgeRecord>,
    hooks: Vec<HookData>,
}

impl Snapshot {
    /// Saved node keys.
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Saved edge records.
    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }
}

/// The persistence subsystem.
pub struct PersistenceSystem {
    config: PersistenceConfig,
    store: Box<dyn Store>,
    hooks: Vec<Box<dyn PersistenceHook>>,
    adapter: Option<DispatchAdapter>,
    changes_since_save: u64,
}

impl std::fmt::Debug for PersistenceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceSystem")
            .field("hooks", &self.hook_names())
            .field("changes_since_save", &self.changes_since_save)
            .finish_non_exhaustive()
    }
}

impl PersistenceSystem {
    /// Create a persistence system writing to `store`.
    pub fn new(config: PersistenceConfig, store: Box<dyn Store>) -> Self {
        Self {
            config,
            store,
            hooks: Vec::new(),
            adapter: None,
            changes_since_save: 0,
        }
    }

    /// Create a persistence system with the store the config asks for: a
    /// [`JsonFileStore`] when a directory is set, otherwise a
    /// [`MemoryStore`].
    ///
    /// # Errors
    ///
    /// Returns any error from [`JsonFileStore::open`].
    pub fn from_config(config: PersistenceConfig) -> Result<Self, PersistError> {
        let store: Box<dyn Store> = match config.directory.as_deref() {
            Some(directory) => Box::new(JsonFileStore::open(directory)?),
            None => Box::new(MemoryStore::new()),
        };
        Ok(Self::new(config, store))
    }

    /// Add a hook. Hooks save and restore in registration order.
    pub fn register_hook(&mut self, hook: impl PersistenceHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Names of the registered hooks, in order.
    pub fn hook_names(&self) -> Vec<String> {
        self.hooks.iter().map(|hook| hook.name().to_owned()).collect()
    }

    /// The backing store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Graph events from other subsystems since the last save or load.
    pub const fn changes_since_save(&self) -> u64 {
        self.changes_since_save
    }

    fn adapter(&self) -> Result<DispatchAdapter, PersistError> {
        self.adapter.clone().ok_or(PersistError::NotStarted)
    }

    /// Write the current graph and every hook's blobs to the store.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NotStarted`] before start, or any store or
    /// hook error.
    pub fn save(&mut self) -> Result<SaveReport, PersistError> {
        let adapter = self.adapter()?;
        let nodes = adapter.node_keys();
        let edges: Vec<EdgeRecord> = adapter
            .edges()
            .into_iter()
            .map(|edge| EdgeRecord {
                key: edge.key,
                from: edge.first,
                to: edge.second,
            })
            .collect();

        let nodes_store = self.config.nodes_store.as_str();
        let edges_store = self.config.edges_store.as_str();
        self.store.clear(nodes_store)?;
        self.store.clear(edges_store)?;
        self.store
            .put(nodes_store, NODES_KEY, &serde_json::to_value(&nodes)?)?;
        self.store
            .put(edges_store, EDGES_KEY, &serde_json::to_value(&edges)?)?;

        let mut blobs: usize = 0;
        for hook in &self.hooks {
            let name = hook.name();
            self.store.clear(name)?;
            for key in &nodes {
                if let Some(blob) = hook.serialize_node(key)? {
                    self.store.put(name, key.as_str(), &blob)?;
                    blobs = blobs.saturating_add(1);
                }
            }
            for edge in &edges {
                if let Some(blob) = hook.serialize_edge(&edge.key)? {
                    self.store.put(name, edge.key.as_str(), &blob)?;
                    blobs = blobs.saturating_add(1);
                }
            }
            if let Some(blob) = hook.serialize_system()? {
                self.store.put(name, name, &blob)?;
                blobs = blobs.saturating_add(1);
            }
        }
        self.store.flush()?;
        self.changes_since_save = 0;

        let report = SaveReport {
            nodes: nodes.len(),
            edges: edges.len(),
            blobs,
        };
        info!(
            nodes = report.nodes,
            edges = report.edges,
            blobs = report.blobs,
            hooks = self.hooks.len(),
            "graph saved"
        );
        Ok(report)
    }

    /// Read and check the saved snapshot without touching the graph.
    ///
    /// # Errors
    ///
    /// [`PersistError::NothingSaved`] if either list is missing,
    /// [`PersistError::CorruptSnapshot`] if the lists disagree, or any
    /// store error.
    pub fn read_snapshot(&self) -> Result<Snapshot, PersistError> {
        let nodes_store = self.config.nodes_store.as_str();
        let edges_store = self.config.edges_store.as_str();
        let nodes: Vec<NodeKey> = match self.store.get(nodes_store, NODES_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => {
                return Err(PersistError::NothingSaved {
                    store: nodes_store.to_owned(),
                });
            }
        };
        let edges: Vec<EdgeRecord> = match self.store.get(edges_store, EDGES_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => {
                return Err(PersistError::NothingSaved {
                    store: edges_store.to_owned(),
                });
            }
        };

        let mut known = BTreeSet::new();
        for key in &nodes {
            if !known.insert(key) {
                return Err(corrupt(format!("node {key} is listed twice")));
            }
        }
        let mut pairs = BTreeSet::new();
        for edge in &edges {
            for end in [&edge.from, &edge.to] {
                if !known.contains(end) {
                    return Err(corrupt(format!(
                        "edge {} references unsaved node {end}",
                        edge.key
                    )));
                }
            }
            if !pairs.insert(EdgeKey::between(&edge.from, &edge.to)) {
                return Err(corrupt(format!("edge {} is listed twice", edge.key)));
            }
        }

        let mut hooks = Vec::with_capacity(self.hooks.len());
        for hook in &self.hooks {
            let name = hook.name();
            hooks.push(HookData {
                nodes: nodes
                    .iter()
                    .map(|key| self.store.get(name, key.as_str()))
                    .collect::<Result<_, _>>()?,
                edges: edges
                    .iter()
                    .map(|edge| self.store.get(name, edge.key.as_str()))
                    .collect::<Result<_, _>>()?,
                system: self.store.get(name, name)?,
            });
        }

        Ok(Snapshot {
            nodes,
            edges,
            hooks,
        })
    }

    /// Re-add a snapshot's nodes and edges under new keys and run every
    /// hook's restores.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NotStarted`] before start, any graph error,
    /// or the first hook error.
    pub fn rebuild(&mut self, snapshot: &Snapshot) -> Result<LoadReport, PersistError> {
        let adapter = self.adapter()?;
        let mut report = LoadReport::default();

        let mut new_nodes = Vec::with_capacity(snapshot.nodes.len());
        for old in &snapshot.nodes {
            let node = adapter.add_node(Value::Null)?;
            report.nodes.insert(old.clone(), node.key.clone());
            new_nodes.push(node.key);
        }

        let mut new_edges = Vec::with_capacity(snapshot.edges.len());
        for record in &snapshot.edges {
            let (Some(from), Some(to)) = (report.nodes.get(&record.from), report.nodes.get(&record.to))
            else {
                return Err(corrupt(format!("edge {} lost an endpoint", record.key)));
            };
            let edge = adapter.add_edge(from, to, Value::Null)?;
            report.edges.insert(record.key.clone(), edge.key.clone());
            new_edges.push(edge.key);
        }

        for (hook, data) in self.hooks.iter_mut().zip(&snapshot.hooks) {
            for (key, blob) in new_nodes.iter().zip(&data.nodes) {
                hook.deserialize_node(key, blob.clone())?;
            }
            for (key, blob) in new_edges.iter().zip(&data.edges) {
                hook.deserialize_edge(key, blob.clone())?;
            }
            hook.deserialize_system(data.system.clone())?;
        }

        self.changes_since_save = 0;
        info!(
            nodes = report.nodes.len(),
            edges = report.edges.len(),
            hooks = self.hooks.len(),
            "graph loaded"
        );
        Ok(report)
    }

    /// Run every hook's reset, in registration order.
    ///
    /// # Errors
    ///
    /// Every hook is reset even if some fail; the first failure is returned.
    pub fn reset_hooks(&mut self) -> Result<(), PersistError> {
        let mut first_error = None;
        for hook in &mut self.hooks {
            if let Err(err) = hook.reset() {
                warn!(hook = hook.name(), error = %err, "hook reset failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn corrupt(reason: String) -> PersistError {
    PersistError::CorruptSnapshot { reason }
}

/// Replace the engine's graph with the saved snapshot.
///
/// The snapshot is read and checked first; an unreadable snapshot leaves the
/// current graph alone. Otherwise the engine is restarted and the graph
/// rebuilt. If any hook rejects its data the engine is restarted once more
/// and every hook is reset, so neither a half-restored graph nor hook state
/// describing it survives.
///
/// # Errors
///
/// Returns [`EngineError::Persist`] for snapshot and hook failures, or any
/// error from [`GraphEngine::restart`].
pub fn load(
    engine: &mut GraphEngine,
    persistence: &SystemHandle<PersistenceSystem>,
) -> Result<LoadReport, EngineError> {
    let snapshot = persistence.with(|p| p.read_snapshot())??;
    engine.restart()?;

    match persistence.with(|p| p.rebuild(&snapshot))? {
        Ok(report) => Ok(report),
        Err(err) => {
            warn!(error = %err, "load failed, discarding partially restored graph");
            if let Err(restart_err) = engine.restart() {
                warn!(error = %restart_err, "restart after failed load also failed");
            }
            match persistence.with(PersistenceSystem::reset_hooks) {
                Ok(Err(reset_err)) => {
                    warn!(error = %reset_err, "hook reset after failed load failed");
                }
                Err(busy) => warn!(error = %busy, "persistence busy after failed load"),
                Ok(Ok(())) => {}
            }
            Err(err.into())
        }
    }
}

impl EventSink for PersistenceSystem {
    type Error = SystemError;

    fn on_event(&mut self, _event: &GraphEvent) -> Result<(), SystemError> {
        self.changes_since_save = self.changes_since_save.saturating_add(1);
        Ok(())
    }
}

impl GraphSystem for PersistenceSystem {
    fn name(&self) -> &'static str {
        "persistence"
    }

    fn start(&mut self, adapter: DispatchAdapter) -> Result<(), SystemError> {
        self.adapter = Some(adapter);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            adapter.unbind();
        }
    }
}
