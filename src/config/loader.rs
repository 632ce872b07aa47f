// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable overriding the default config location.
pub const CONFIG_ENV_VAR: &str = "FLOWRUN_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Deserialize a configuration from TOML text.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` default functions).
/// - Checks engine/retry bounds, that every task yields a valid request,
///   unknown `after` references and dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading config");
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the config path used when `--config` is not given:
/// `$FLOWRUN_CONFIG` if set, otherwise `Flowrun.toml` in the current
/// working directory.
pub fn default_config_path() -> PathBuf {
    config_path_from(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

/// Pure form of [`default_config_path`].
pub fn config_path_from(env_value: Option<PathBuf>) -> PathBuf {
    match env_value {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => PathBuf::from("Flowrun.toml"),
    }
}
