// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::{DependencyGraph, DependencyNode, DependencyResolver};
use crate::errors::{FlowrunError, Result};
use crate::exec::request::MAX_TIMEOUT;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FlowrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.retry, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_engine(cfg)?;
    validate_retry(cfg)?;
    validate_tasks(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(FlowrunError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    let engine = &cfg.engine;

    if engine.host.trim().is_empty() {
        return Err(FlowrunError::ConfigError(
            "[engine].host must not be empty".to_string(),
        ));
    }

    if engine.max_concurrent == 0 {
        return Err(FlowrunError::ConfigError(
            "[engine].max_concurrent must be >= 1 (got 0)".to_string(),
        ));
    }

    let timeout = Duration::from_secs(engine.default_timeout_secs);
    if timeout.is_zero() || timeout > MAX_TIMEOUT {
        return Err(FlowrunError::ConfigError(format!(
            "[engine].default_timeout_secs must be within 1..={} (got {})",
            MAX_TIMEOUT.as_secs(),
            engine.default_timeout_secs
        )));
    }

    if engine.default_retries > cfg.retry.max_retries {
        return Err(FlowrunError::ConfigError(format!(
            "[engine].default_retries ({}) exceeds [retry].max_retries ({})",
            engine.default_retries, cfg.retry.max_retries
        )));
    }

    Ok(())
}

fn validate_retry(cfg: &RawConfigFile) -> Result<()> {
    if cfg.retry.max_delay_ms < cfg.retry.base_delay_ms {
        return Err(FlowrunError::ConfigError(format!(
            "[retry].max_delay_ms ({}) must be >= base_delay_ms ({})",
            cfg.retry.max_delay_ms, cfg.retry.base_delay_ms
        )));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        task.descriptor(name)
            .to_request()
            .validate()
            .map_err(|e| FlowrunError::ConfigError(format!("[task.{name}]: {e}")))?;
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so `[task.B] after = ["A"]` yields A -> B.
    let mut graph = DependencyGraph::new();
    for (name, task) in cfg.task.iter() {
        let node = DependencyNode::new(name.as_str(), task.descriptor(name).to_request())
            .after(task.after.iter().cloned());
        graph.add_node(node)?;
    }

    DependencyResolver::validate(graph)?;
    Ok(())
}
