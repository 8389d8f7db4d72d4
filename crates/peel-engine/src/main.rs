//! Demo binary for the Peel editor core.
//!
//! Wires the engine together with its built-in subsystems, places a seeded
//! scatter of nodes, runs the frame loop, then saves the graph and loads it
//! back.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `peel-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the engine and register layout, history and persistence
//! 4. Scatter seeded random nodes through the layout system
//! 5. Run the bounded frame loop (when `engine.self_start` is set)
//! 6. Save, load, and log both reports
//! 7. Stop every subsystem

mod error;
mod frame_log;
mod scatter;

use std::path::Path;
use std::sync::Arc;

use peel_core::config::EngineConfig;
use peel_core::control::FrameControl;
use peel_core::engine::GraphEngine;
use peel_core::history::HistorySystem;
use peel_core::layout::LayoutSystem;
use peel_core::persist::{self, HistoryHook, LayoutHook, PersistenceSystem};
use peel_core::runner;
use peel_events::GraphAccess;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::frame_log::FrameLog;

/// Config file looked up in the working directory.
const CONFIG_PATH: &str = "peel-config.yaml";

/// Frames between info-level frame reports.
const REPORT_EVERY: u64 = 60;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, a subsystem, or the frame loop fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    let fallback = config.logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(true)
        .init();

    info!(
        frame_interval_ms = config.engine.frame_interval_ms,
        max_frames = config.engine.max_frames,
        hull_enabled = config.layout.hull_enabled,
        store = config.persistence.directory.as_deref().unwrap_or("memory"),
        "peel-engine starting"
    );

    // 3. Build the engine and its subsystems.
    let mut engine = GraphEngine::new();
    let layout = engine.register(LayoutSystem::new(config.layout.clone()))?;
    let history = engine.register(HistorySystem::new(&config.history))?;
    let mut persistence = PersistenceSystem::from_config(config.persistence.clone())?;
    persistence.register_hook(LayoutHook::new(layout.clone()));
    persistence.register_hook(HistoryHook::new(history.clone()));
    let persistence = engine.register(persistence)?;
    info!(systems = engine.systems().len(), "Subsystems registered");

    // 4. Scatter nodes.
    let scatter_config = scatter::load_scatter_config(Path::new(CONFIG_PATH))?;
    scatter::scatter_nodes(&scatter_config, &layout)?;
    info!(
        nodes = engine.stream().node_count(),
        edges = engine.stream().edge_count(),
        "Initial graph built"
    );

    // 5. Run frames.
    if config.engine.self_start {
        let control = Arc::new(FrameControl::new(&config.engine));
        let mut callback = FrameLog::new(layout.clone(), REPORT_EVERY);
        let result = runner::run_frames(&mut engine, &control, &mut callback).await?;
        runner::log_run_end(&result);
    } else {
        info!("self_start disabled, skipping frame loop");
    }

    // 6. Save and load.
    let saved = persistence.with(|p| p.save())??;
    info!(
        nodes = saved.nodes,
        edges = saved.edges,
        blobs = saved.blobs,
        "Graph saved"
    );

    let loaded = persist::load(&mut engine, &persistence)?;
    info!(
        nodes = loaded.nodes.len(),
        edges = loaded.edges.len(),
        generation = engine.generation(),
        history_lines = history.with(|h| h.lines().len())?,
        "Graph reloaded"
    );

    // 7. Shut down.
    engine.stop()?;
    info!(frame = engine.frame(), "peel-engine shutdown complete");

    Ok(())
}

/// Load the engine configuration from `peel-config.yaml`, or defaults if
/// the file is absent.
fn load_config() -> Result<EngineConfig, AppError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(EngineConfig::from_file(config_path)?)
    } else {
        Ok(EngineConfig::parse("")?)
    }
}
