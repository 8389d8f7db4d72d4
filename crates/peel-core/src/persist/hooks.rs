//! Persistence hooks for the built-in subsystems.

use peel_types::{EdgeKey, NodeKey, Point};
use serde_json::{Value, json};

use super::error::PersistError;
use super::hook::PersistenceHook;
use crate::engine::EngineError;
use crate::history::HistorySystem;
use crate::layout::{LayoutSystem, Placement};
use crate::system::SystemHandle;

fn unavailable(hook: &str, err: &EngineError) -> PersistError {
    PersistError::HookUnavailable {
        hook: hook.to_owned(),
        reason: err.to_string(),
    }
}

fn broken(hook: &str, key: impl ToString, reason: &str) -> PersistError {
    PersistError::InvariantBroken {
        hook: hook.to_owned(),
        key: key.to_string(),
        reason: reason.to_owned(),
    }
}

/// Saves node positions and colors and edge colors.
///
/// Node blobs are `{"x", "y", "color"}`; edge blobs are `{"color"}`. Every
/// node and edge must have a blob on load. Restoring the system blob
/// recomputes the hulls over the restored positions.
#[derive(Debug, Clone)]
pub struct LayoutHook {
    layout: SystemHandle<LayoutSystem>,
}

impl LayoutHook {
    const NAME: &'static str = "layout";

    /// Create a hook for a registered layout system.
    pub const fn new(layout: SystemHandle<LayoutSystem>) -> Self {
        Self { layout }
    }

    fn with<R>(&self, f: impl FnOnce(&mut LayoutSystem) -> R) -> Result<R, PersistError> {
        self.layout
            .with(f)
            .map_err(|err| unavailable(Self::NAME, &err))
    }
}

impl PersistenceHook for LayoutHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn serialize_node(&self, key: &NodeKey) -> Result<Option<Value>, PersistError> {
        let placement = self.with(|layout| layout.placement(key).cloned())?;
        Ok(placement.map(|p| {
            json!({
                "x": p.position.x,
                "y": p.position.y,
                "color": p.color,
            })
        }))
    }

    fn serialize_edge(&self, key: &EdgeKey) -> Result<Option<Value>, PersistError> {
        let color = self.with(|layout| layout.edge_color(key).map(str::to_owned))?;
        Ok(color.map(|color| json!({ "color": color })))
    }

    fn serialize_system(&self) -> Result<Option<Value>, PersistError> {
        Ok(None)
    }

    fn deserialize_node(&mut self, key: &NodeKey, data: Option<Value>) -> Result<(), PersistError> {
        let data = data.ok_or_else(|| broken(Self::NAME, key, "no placement saved"))?;
        let x = data.get("x").and_then(Value::as_f64);
        let y = data.get("y").and_then(Value::as_f64);
        let color = data.get("color").and_then(Value::as_str);
        let (Some(x), Some(y), Some(color)) = (x, y, color) else {
            return Err(broken(Self::NAME, key, "placement needs x, y and color"));
        };
        let placement = Placement {
            position: Point::new(x, y),
            color: color.to_owned(),
        };
        self.with(|layout| layout.restore_placement(key, placement))??;
        Ok(())
    }

    fn deserialize_edge(&mut self, key: &EdgeKey, data: Option<Value>) -> Result<(), PersistError> {
        let data = data.ok_or_else(|| broken(Self::NAME, key, "no edge color saved"))?;
        let Some(color) = data.get("color").and_then(Value::as_str) else {
            return Err(broken(Self::NAME, key, "edge data needs a color"));
        };
        let color = color.to_owned();
        self.with(|layout| layout.restore_edge_color(key, color))??;
        Ok(())
    }

    fn deserialize_system(&mut self, _data: Option<Value>) -> Result<(), PersistError> {
        self.with(LayoutSystem::recompute_hulls)??;
        Ok(())
    }
}

/// Saves the change log as the system blob, a JSON array of lines.
#[derive(Debug, Clone)]
pub struct HistoryHook {
    history: SystemHandle<HistorySystem>,
}

impl HistoryHook {
    const NAME: &'static str = "history";

    /// Create a hook for a registered history system.
    pub const fn new(history: SystemHandle<HistorySystem>) -> Self {
        Self { history }
    }
}

impl PersistenceHook for HistoryHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn serialize_node(&self, _key: &NodeKey) -> Result<Option<Value>, PersistError> {
        Ok(None)
    }

    fn serialize_edge(&self, _key: &EdgeKey) -> Result<Option<Value>, PersistError> {
        Ok(None)
    }

    fn serialize_system(&self) -> Result<Option<Value>, PersistError> {
        let lines = self
            .history
            .with(|history| history.lines())
            .map_err(|err| unavailable(Self::NAME, &err))?;
        Ok(Some(json!(lines)))
    }

    fn deserialize_node(&mut self, _key: &NodeKey, _data: Option<Value>) -> Result<(), PersistError> {
        Ok(())
    }

    fn deserialize_edge(&mut self, _key: &EdgeKey, _data: Option<Value>) -> Result<(), PersistError> {
        Ok(())
    }

    fn deserialize_system(&mut self, data: Option<Value>) -> Result<(), PersistError> {
        let data = data.ok_or_else(|| broken(Self::NAME, Self::NAME, "no log saved"))?;
        let lines: Vec<String> = serde_json::from_value(data)
            .map_err(|err| broken(Self::NAME, Self::NAME, &err.to_string()))?;
        self.history
            .with(|history| history.restore(lines))
            .map_err(|err| unavailable(Self::NAME, &err))
    }

    fn reset(&mut self) -> Result<(), PersistError> {
        self.history
            .with(HistorySystem::clear)
            .map_err(|err| unavailable(Self::NAME, &err))
    }
}
