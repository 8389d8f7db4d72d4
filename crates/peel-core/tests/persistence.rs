//! Save and load through the persistence subsystem and its hooks.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use peel_core::config::{HistoryConfig, LayoutConfig, PersistenceConfig};
use peel_core::engine::{EngineError, GraphEngine};
use peel_core::history::HistorySystem;
use peel_core::layout::LayoutSystem;
use peel_core::persist::{
    self, HistoryHook, LayoutHook, MemoryStore, PersistError, PersistenceHook, PersistenceSystem,
    Store,
};
use peel_core::system::SystemHandle;
use peel_events::GraphAccess;
use peel_types::{EdgeKey, NodeKey, Point};
use serde_json::{Value, json};

struct Editor {
    engine: GraphEngine,
    layout: SystemHandle<LayoutSystem>,
    history: SystemHandle<HistorySystem>,
    persistence: SystemHandle<PersistenceSystem>,
}

fn editor(layout_config: LayoutConfig) -> Editor {
    let mut engine = GraphEngine::new();
    let layout = engine.register(LayoutSystem::new(layout_config)).unwrap();
    let history = engine
        .register(HistorySystem::new(&HistoryConfig::default()))
        .unwrap();

    let mut persistence =
        PersistenceSystem::new(PersistenceConfig::default(), Box::new(MemoryStore::new()));
    persistence.register_hook(LayoutHook::new(layout.clone()));
    persistence.register_hook(HistoryHook::new(history.clone()));
    let persistence = engine.register(persistence).unwrap();

    Editor {
        engine,
        layout,
        history,
        persistence,
    }
}

fn place(editor: &Editor, x: f64, y: f64) -> NodeKey {
    editor
        .layout
        .with(|l| l.place_node(Point::new(x, y)))
        .unwrap()
        .unwrap()
}

fn blob_text(editor: &Editor, store: &str, key: &str) -> Option<String> {
    editor
        .persistence
        .with(|p| p.store().get(store, key).unwrap())
        .unwrap()
        .map(|value| value.to_string())
}

#[test]
fn two_nodes_and_an_edge_survive_save_and_load() {
    let mut ed = editor(LayoutConfig::default());
    let a = place(&ed, 1.5, 2.0);
    let b = place(&ed, -3.25, 7.0);
    assert_eq!(ed.engine.stream().edge_count(), 1);

    let saved = ed.persistence.with(|p| p.save()).unwrap().unwrap();
    assert_eq!(saved.nodes, 2);
    assert_eq!(saved.edges, 1);
    let before_a = blob_text(&ed, "layout", a.as_str()).unwrap();
    let before_b = blob_text(&ed, "layout", b.as_str()).unwrap();
    let before_edge = blob_text(&ed, "layout", EdgeKey::between(&a, &b).as_str()).unwrap();

    let report = persist::load(&mut ed.engine, &ed.persistence).unwrap();

    assert_eq!(ed.engine.stream().node_count(), 2);
    assert_eq!(ed.engine.stream().edge_count(), 1);
    let new_a = report.nodes[&a].clone();
    let new_b = report.nodes[&b].clone();
    assert_ne!(new_a, a);
    assert_eq!(
        ed.layout.with(|l| l.position(&new_a)).unwrap(),
        Some(Point::new(1.5, 2.0))
    );

    // Saving again writes the same bytes under the new keys.
    ed.persistence.with(|p| p.save()).unwrap().unwrap();
    assert_eq!(blob_text(&ed, "layout", new_a.as_str()).unwrap(), before_a);
    assert_eq!(blob_text(&ed, "layout", new_b.as_str()).unwrap(), before_b);
    let new_edge = report.edges[&EdgeKey::between(&a, &b)].clone();
    assert_eq!(
        blob_text(&ed, "layout", new_edge.as_str()).unwrap(),
        before_edge
    );
}

#[test]
fn history_log_is_restored_verbatim() {
    let mut ed = editor(LayoutConfig::default());
    ed.engine.stream().add_node(Value::Null).unwrap();
    ed.engine.stream().add_node(Value::Null).unwrap();
    let lines = ed.history.with(|h| h.lines()).unwrap();

    ed.persistence.with(|p| p.save()).unwrap().unwrap();
    persist::load(&mut ed.engine, &ed.persistence).unwrap();

    assert_eq!(ed.history.with(|h| h.lines()).unwrap(), lines);
}

#[test]
fn hull_edges_follow_restored_positions() {
    let mut ed = editor(LayoutConfig::default());
    for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)] {
        place(&ed, x, y);
    }
    ed.persistence.with(|p| p.save()).unwrap().unwrap();

    persist::load(&mut ed.engine, &ed.persistence).unwrap();

    assert_eq!(ed.engine.stream().node_count(), 5);
    assert_eq!(ed.engine.stream().edge_count(), 4);
    assert_eq!(ed.layout.with(|l| l.hulls().layer_count()).unwrap(), 2);
}

#[test]
fn load_without_save_reports_nothing_saved() {
    let mut ed = editor(LayoutConfig::default());
    place(&ed, 1.0, 1.0);

    let result = persist::load(&mut ed.engine, &ed.persistence);

    assert!(matches!(
        result,
        Err(EngineError::Persist(PersistError::NothingSaved { .. }))
    ));
    assert_eq!(ed.engine.stream().node_count(), 1);
    assert_eq!(ed.engine.generation(), 0);
}

/// A change made to a saved store behind the persistence system's back.
struct Tamper {
    store: &'static str,
    key: &'static str,
    blob: Option<Value>,
}

/// A hook that saves nothing and accepts anything.
struct Silent;

impl PersistenceHook for Silent {
    fn name(&self) -> &str {
        "silent"
    }

    fn serialize_node(&self, _key: &NodeKey) -> Result<Option<Value>, PersistError> {
        Ok(None)
    }

    fn serialize_edge(&self, _key: &EdgeKey) -> Result<Option<Value>, PersistError> {
        Ok(None)
    }

    fn serialize_system(&self) -> Result<Option<Value>, PersistError> {
        Ok(None)
    }

    fn deserialize_node(&mut self, _key: &NodeKey, _data: Option<Value>) -> Result<(), PersistError> {
        Ok(())
    }

    fn deserialize_edge(&mut self, _key: &EdgeKey, _data: Option<Value>) -> Result<(), PersistError> {
        Ok(())
    }

    fn deserialize_system(&mut self, _data: Option<Value>) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Builds an editor whose store was saved and then altered by `tamper`.
fn tampered_editor(tamper: &Tamper) -> Editor {
    let mut persistence_store = MemoryStore::new();
    let source = editor(LayoutConfig::default());
    place(&source, 0.0, 0.0);
    place(&source, 2.0, 0.0);
    source.persistence.with(|p| p.save()).unwrap().unwrap();

    // Copy every saved blob, then apply the alteration.
    for store in ["nodes_db", "edges_db", "layout", "history"] {
        for key in ["nodes", "edges", "layout", "history", "0", "1", "0-1"] {
            if let Some(blob) = source
                .persistence
                .with(|p| p.store().get(store, key).unwrap())
                .unwrap()
            {
                persistence_store.put(store, key, &blob).unwrap();
            }
        }
    }
    match &tamper.blob {
        Some(blob) => {
            persistence_store.put(tamper.store, tamper.key, blob).unwrap();
        }
        None => {
            persistence_store.remove(tamper.store, tamper.key).unwrap();
        }
    }

    let mut engine = GraphEngine::new();
    let layout = engine.register(LayoutSystem::new(LayoutConfig::default())).unwrap();
    let history = engine
        .register(HistorySystem::new(&HistoryConfig::default()))
        .unwrap();
    let mut persistence =
        PersistenceSystem::new(PersistenceConfig::default(), Box::new(persistence_store));
    persistence.register_hook(LayoutHook::new(layout.clone()));
    persistence.register_hook(HistoryHook::new(history.clone()));
    let persistence = engine.register(persistence).unwrap();

    Editor {
        engine,
        layout,
        history,
        persistence,
    }
}

#[test]
fn missing_node_placement_breaks_the_load() {
    let mut ed = tampered_editor(&Tamper {
        store: "layout",
        key: "1",
        blob: None,
    });
    ed.engine.stream().add_node(Value::Null).unwrap();

    let result = persist::load(&mut ed.engine, &ed.persistence);

    assert!(matches!(
        result,
        Err(EngineError::Persist(PersistError::InvariantBroken { ref hook, .. })) if hook == "layout"
    ));
    // The half-restored graph was discarded, and so was its history.
    assert_eq!(ed.engine.stream().node_count(), 0);
    assert_eq!(ed.engine.generation(), 2);
    assert!(ed.history.with(|h| h.lines()).unwrap().is_empty());
}

#[test]
fn malformed_history_breaks_the_load() {
    let mut ed = tampered_editor(&Tamper {
        store: "history",
        key: "history",
        blob: Some(json!({"not": "a list"})),
    });

    let result = persist::load(&mut ed.engine, &ed.persistence);

    assert!(matches!(
        result,
        Err(EngineError::Persist(PersistError::InvariantBroken { ref hook, .. })) if hook == "history"
    ));
    assert_eq!(ed.engine.stream().node_count(), 0);
    assert!(ed.history.with(|h| h.text()).unwrap().is_empty());
}

#[test]
fn corrupt_snapshot_leaves_graph_untouched() {
    let mut ed = tampered_editor(&Tamper {
        store: "edges_db",
        key: "edges",
        blob: Some(json!([{"key": "0-9", "from": "0", "to": "9"}])),
    });
    let kept = ed.engine.stream().add_node(Value::Null).unwrap().key;

    let result = persist::load(&mut ed.engine, &ed.persistence);

    assert!(matches!(
        result,
        Err(EngineError::Persist(PersistError::CorruptSnapshot { .. }))
    ));
    assert_eq!(ed.engine.generation(), 0);
    assert!(ed.engine.stream().contains_node(&kept));
}

#[test]
fn hook_without_data_is_harmless() {
    let mut ed = editor(LayoutConfig::default());
    ed.persistence
        .with(|p| p.register_hook(Silent))
        .unwrap();
    place(&ed, 0.0, 0.0);
    ed.persistence.with(|p| p.save()).unwrap().unwrap();

    let report = persist::load(&mut ed.engine, &ed.persistence).unwrap();

    assert_eq!(report.nodes.len(), 1);
    assert_eq!(
        ed.persistence.with(|p| p.hook_names()).unwrap(),
        vec!["layout", "history", "silent"]
    );
}
