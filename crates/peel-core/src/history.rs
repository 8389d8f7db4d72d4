//! Change log of graph events made by other subsystems.

use std::collections::VecDeque;

use peel_events::{DispatchAdapter, EventSink};
use peel_types::GraphEvent;

use crate::config::HistoryConfig;
use crate::system::{GraphSystem, SystemError};

/// Keeps a newest-first text log of additions and removals.
#[derive(Debug)]
pub struct HistorySystem {
    max_entries: usize,
    adapter: Option<DispatchAdapter>,
    lines: VecDeque<String>,
}

impl HistorySystem {
    /// Create an empty log.
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            adapter: None,
            lines: VecDeque::new(),
        }
    }

    /// Log lines, newest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// The log as one newline-separated text.
    pub fn text(&self) -> String {
        self.lines().join("\n")
    }

    /// Replace the log with saved lines (newest first).
    pub fn restore(&mut self, lines: Vec<String>) {
        self.lines = lines.into_iter().take(self.max_entries).collect();
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn push(&mut self, line: String) {
        self.lines.push_front(line);
        self.lines.truncate(self.max_entries);
    }
}

impl EventSink for HistorySystem {
    type Error = SystemError;

    fn on_event(&mut self, event: &GraphEvent) -> Result<(), SystemError> {
        let verb = if event.kind.is_addition() {
            "added"
        } else {
            "removed"
        };
        self.push(format!("{verb}: {}", event.key));
        Ok(())
    }
}

impl GraphSystem for HistorySystem {
    fn name(&self) -> &'static str {
        "history"
    }

    fn init(&mut self) -> Result<(), SystemError> {
        self.clear();
        Ok(())
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use peel_events::GraphAccess;
    use serde_json::Value;

    use super::*;
    use crate::engine::GraphEngine;

    #[test]
    fn logs_newest_first() {
        let mut engine = GraphEngine::new();
        let history = engine
            .register(HistorySystem::new(&HistoryConfig::default()))
            .unwrap();

        let a = engine.stream().add_node(Value::Null).unwrap().key;
        let b = engine.stream().add_node(Value::Null).unwrap().key;
        engine.stream().add_edge(&a, &b, Value::Null).unwrap();
        engine.stream().remove_node(&a).unwrap();

        let lines = history.with(|h| h.lines()).unwrap();
        assert_eq!(
            lines,
            vec!["removed: 0", "removed: 0-1", "added: 0-1", "added: 1", "added: 0"]
        );
        assert!(history.with(|h| h.text()).unwrap().starts_with("removed: 0\n"));
    }

    #[test]
    fn log_is_capped() {
        let mut engine = GraphEngine::new();
        let history = engine
            .register(HistorySystem::new(&HistoryConfig { max_entries: 2 }))
            .unwrap();
        for _ in 0..5 {
            engine.stream().add_node(Value::Null).unwrap();
        }
        assert_eq!(
            history.with(|h| h.lines()).unwrap(),
            vec!["added: 4", "added: 3"]
        );
    }

    #[test]
    fn log_survives_restart_and_restore_replaces_it() {
        let mut engine = GraphEngine::new();
        let history = engine
            .register(HistorySystem::new(&HistoryConfig::default()))
            .unwrap();
        engine.stream().add_node(Value::Null).unwrap();
        engine.restart().unwrap();
        assert_eq!(history.with(|h| h.lines().len()).unwrap(), 1);

        history
            .with(|h| h.restore(vec!["added: 9".to_owned()]))
            .unwrap();
        assert_eq!(history.with(|h| h.text()).unwrap(), "added: 9");
    }

    #[test]
    fn clear_empties_the_log() {
        let mut engine = GraphEngine::new();
        let history = engine
            .register(HistorySystem::new(&HistoryConfig::default()))
            .unwrap();
        engine.stream().add_node(Value::Null).unwrap();

        history.with(HistorySystem::clear).unwrap();

        assert!(history.with(|h| h.lines()).unwrap().is_empty());
    }
}
