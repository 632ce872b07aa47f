// src/config/mod.rs

//! Configuration loading and validation for flowrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate engine bounds, task requests and the task graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, EngineSection, RawConfigFile, RetrySection, TaskConfig};
