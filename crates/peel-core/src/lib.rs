//! Subsystem scheduler, frame loop, and built-in subsystems for the Peel
//! graph editor core.
//!
//! # Modules
//!
//! - [`clock`] -- Frame counter.
//! - [`config`] -- Configuration loading from `peel-config.yaml`.
//! - [`control`] -- [`FrameControl`], shared pause/stop/restart state.
//! - [`engine`] -- [`GraphEngine`], the explicit engine context.
//! - [`history`] -- Change log subsystem.
//! - [`layout`] -- Node placement and hull edge subsystem.
//! - [`persist`] -- Stores, hooks, save and load.
//! - [`runner`] -- The async frame loop.
//! - [`system`] -- The [`GraphSystem`] contract and typed handles.
//!
//! [`FrameControl`]: control::FrameControl
//! [`GraphEngine`]: engine::GraphEngine
//! [`GraphSystem`]: system::GraphSystem

pub mod clock;
pub mod config;
pub mod control;
pub mod engine;
pub mod history;
pub mod layout;
pub mod persist;
pub mod runner;
pub mod system;
