//! Configuration loading and typed config structures for the Peel engine.
//!
//! The canonical configuration lives in `peel-config.yaml` at the project
//! root. Every section and field is optional; anything missing falls back to
//! the defaults below.

use std::path::Path;

use serde::Deserialize;

/// Environment variable that overrides `persistence.directory`.
pub const STORE_DIR_ENV: &str = "PEEL_STORE_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration, mirroring `peel-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Frame loop timing and bounds.
    #[serde(default)]
    pub engine: FrameConfig,

    /// Layout and hull settings.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Change log settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Snapshot store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `PEEL_STORE_DIR` overrides `persistence.directory` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        if yaml.trim().is_empty() {
            let mut config = Self::default();
            config.persistence.apply_env_overrides();
            return Ok(config);
        }
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.persistence.apply_env_overrides();
        Ok(config)
    }
}

/// Frame loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrameConfig {
    /// Milliseconds between frames.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Stop after this many frames (0 = unlimited).
    #[serde(default)]
    pub max_frames: u64,

    /// Stop after this much wall-clock time (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Start the frame loop as soon as the engine is built.
    #[serde(default = "default_true")]
    pub self_start: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            max_frames: 0,
            max_real_time_seconds: 0,
            self_start: true,
        }
    }
}

/// Layout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayoutConfig {
    /// Whether hull edges are maintained at all.
    #[serde(default = "default_true")]
    pub hull_enabled: bool,

    /// Fill color for new nodes.
    #[serde(default = "default_node_color")]
    pub node_color: String,

    /// Stroke color for new edges.
    #[serde(default = "default_edge_color")]
    pub edge_color: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            hull_enabled: true,
            node_color: default_node_color(),
            edge_color: default_edge_color(),
        }
    }
}

/// History configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of change-log lines kept.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for JSON snapshot files. `None` keeps snapshots in memory.
    #[serde(default)]
    pub directory: Option<String>,

    /// Name of the store holding the node key list.
    #[serde(default = "default_nodes_store")]
    pub nodes_store: String,

    /// Name of the store holding edge records.
    #[serde(default = "default_edges_store")]
    pub edges_store: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            directory: None,
            nodes_store: default_nodes_store(),
            edges_store: default_edges_store(),
        }
    }
}

impl PersistenceConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(STORE_DIR_ENV) {
            self.directory = Some(dir);
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

const fn default_frame_interval_ms() -> u64 {
    16
}

fn default_node_color() -> String {
    "white".to_owned()
}

fn default_edge_color() -> String {
    "black".to_owned()
}

const fn default_max_entries() -> usize {
    1000
}

fn default_nodes_store() -> String {
    "nodes_db".to_owned()
}

fn default_edges_store() -> String {
    "edges_db".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.engine.frame_interval_ms, 16);
        assert_eq!(config.engine.max_frames, 0);
        assert!(config.engine.self_start);
        assert!(config.layout.hull_enabled);
        assert_eq!(config.layout.node_color, "white");
        assert_eq!(config.history.max_entries, 1000);
        assert_eq!(config.persistence.nodes_store, "nodes_db");
        assert_eq!(config.persistence.edges_store, "edges_db");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
engine:
  frame_interval_ms: 33
  max_frames: 120
  max_real_time_seconds: 10
  self_start: false

layout:
  hull_enabled: false
  node_color: "red"
  edge_color: "grey"

history:
  max_entries: 50

persistence:
  nodes_store: "n"
  edges_store: "e"

logging:
  level: "debug"
"#;

        let config = EngineConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(EngineConfig::default);

        assert_eq!(config.engine.frame_interval_ms, 33);
        assert_eq!(config.engine.max_frames, 120);
        assert!(!config.engine.self_start);
        assert!(!config.layout.hull_enabled);
        assert_eq!(config.layout.edge_color, "grey");
        assert_eq!(config.history.max_entries, 50);
        assert_eq!(config.persistence.nodes_store, "n");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "engine:\n  max_frames: 7\n";
        let config = EngineConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(EngineConfig::default);

        assert_eq!(config.engine.max_frames, 7);
        assert_eq!(config.engine.frame_interval_ms, 16);
        assert_eq!(config.layout.node_color, "white");
    }

    #[test]
    fn parse_empty_yaml() {
        let config = EngineConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn parse_invalid_yaml_fails() {
        let config = EngineConfig::parse("engine: [unclosed");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn store_directory_override() {
        let mut persistence = PersistenceConfig::default();
        persistence.apply_overrides(|name| {
            (name == STORE_DIR_ENV).then(|| "/tmp/peel-store".to_owned())
        });
        assert_eq!(persistence.directory.as_deref(), Some("/tmp/peel-store"));

        let mut untouched = PersistenceConfig::default();
        untouched.apply_overrides(|_name| None);
        assert_eq!(untouched.directory, None);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("peel-config.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
