//! Seeded random node placement for the demo run.
//!
//! Reads the `scatter` section of `peel-config.yaml` and places that many
//! nodes uniformly inside a `width` x `height` canvas through the layout
//! system, so every placement goes through the usual hull recomputation.

use std::path::Path;

use peel_core::layout::LayoutSystem;
use peel_core::system::SystemHandle;
use peel_types::{NodeKey, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Scatter settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScatterConfig {
    /// Random seed; the same seed yields the same graph.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of nodes to place.
    #[serde(default = "default_node_count")]
    pub node_count: u32,

    /// Canvas width.
    #[serde(default = "default_extent")]
    pub width: f64,

    /// Canvas height.
    #[serde(default = "default_extent")]
    pub height: f64,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            node_count: default_node_count(),
            width: default_extent(),
            height: default_extent(),
        }
    }
}

impl ScatterConfig {
    /// Check that the canvas extents are usable as sampling ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Scatter`] if `width` or `height` is NaN or
    /// infinite.
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, extent) in [("width", self.width), ("height", self.height)] {
            if !extent.is_finite() {
                return Err(AppError::Scatter {
                    message: format!("scatter {name} must be finite, got {extent}"),
                });
            }
        }
        Ok(())
    }
}

const fn default_seed() -> u64 {
    42
}

const fn default_node_count() -> u32 {
    24
}

const fn default_extent() -> f64 {
    800.0
}

/// Load the `scatter` section from a config file.
///
/// A missing file or section yields the defaults.
///
/// # Errors
///
/// Returns [`AppError::Scatter`] if the file exists but cannot be read or
/// parsed.
pub fn load_scatter_config(path: &Path) -> Result<ScatterConfig, AppError> {
    if !path.exists() {
        return Ok(ScatterConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| AppError::Scatter {
        message: format!("failed to read config file: {e}"),
    })?;
    parse_scatter_config(&contents)
}

/// Parse the `scatter` section out of a full config document.
///
/// # Errors
///
/// Returns [`AppError::Scatter`] if the YAML or the section is malformed,
/// or if a canvas extent is not finite.
pub fn parse_scatter_config(yaml: &str) -> Result<ScatterConfig, AppError> {
    if yaml.trim().is_empty() {
        return Ok(ScatterConfig::default());
    }
    let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| AppError::Scatter {
        message: format!("failed to parse config YAML: {e}"),
    })?;
    let config: ScatterConfig = match raw.get("scatter") {
        Some(section) => serde_yml::from_value(section.clone()).map_err(|e| AppError::Scatter {
            message: format!("failed to parse scatter config: {e}"),
        })?,
        None => ScatterConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

// -----------------------------------------------------------------------
// Placement
// -----------------------------------------------------------------------

/// Place `config.node_count` nodes at seeded random positions.
///
/// # Errors
///
/// Returns [`AppError::Scatter`] if the canvas is not finite,
/// [`AppError::Engine`] if the layout system is busy, or
/// [`AppError::Layout`] if a placement fails.
pub fn scatter_nodes(
    config: &ScatterConfig,
    layout: &SystemHandle<LayoutSystem>,
) -> Result<Vec<NodeKey>, AppError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut keys = Vec::new();
    for _ in 0..config.node_count {
        let point = random_point(&mut rng, config.width, config.height);
        let key = layout.with(|l| l.place_node(point))??;
        keys.push(key);
    }
    info!(
        nodes = keys.len(),
        seed = config.seed,
        "Nodes scattered"
    );
    Ok(keys)
}

fn random_point(rng: &mut impl Rng, width: f64, height: f64) -> Point {
    let x = if width > 0.0 { rng.random_range(0.0..width) } else { 0.0 };
    let y = if height > 0.0 { rng.random_range(0.0..height) } else { 0.0 };
    Point::new(x, y)
}
