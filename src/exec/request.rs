// src/exec/request.rs

//! Execution requests and their contract checks.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::errors::{FlowrunError, Result};
use crate::types::{TaskId, Variables};

/// Longest accepted task identifier.
pub const MAX_TASK_ID_LEN: usize = 255;

/// Longest accepted per-request timeout (2 hours).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(7200);

/// Largest retry limit a caller may ask for.
pub const MAX_REQUEST_RETRIES: u32 = 10;

/// Deepest accepted nesting of input values (top-level values are level 1).
pub const MAX_INPUT_DEPTH: usize = 5;

static TASK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("task id pattern is a valid regex")
});

/// One request to run a flow.
///
/// Immutable once built; the `with_*` methods consume and return a new value.
/// Construction never fails: validation happens in [`ExecutionRequest::validate`],
/// which every executor entry point calls before launching anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    task_id: TaskId,
    inputs: Variables,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl ExecutionRequest {
    pub fn new(task_id: impl Into<TaskId>, inputs: Variables) -> Self {
        Self {
            task_id: task_id.into(),
            inputs,
            timeout: None,
            max_retries: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Overlay `extra` on top of this request's inputs (extra wins).
    pub fn with_inputs(mut self, extra: Variables) -> Self {
        self.inputs.extend(extra);
        self
    }

    /// Merge the outputs of an upstream step into this request.
    ///
    /// Upstream outputs form the base; inputs set directly on this request
    /// override them on key conflicts.
    pub fn with_upstream_outputs(mut self, upstream: Variables) -> Self {
        let own = std::mem::replace(&mut self.inputs, upstream);
        self.inputs.extend(own);
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn inputs(&self) -> &Variables {
        &self.inputs
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Check the caller contract.
    pub fn validate(&self) -> Result<()> {
        validate_task_id(&self.task_id)?;

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() || timeout > MAX_TIMEOUT {
                return Err(FlowrunError::InvalidRequest(format!(
                    "task '{}': timeout must be within (0, {}s], got {}ms",
                    self.task_id,
                    MAX_TIMEOUT.as_secs(),
                    timeout.as_millis()
                )));
            }
        }

        if let Some(retries) = self.max_retries {
            if retries > MAX_REQUEST_RETRIES {
                return Err(FlowrunError::InvalidRequest(format!(
                    "task '{}': retry limit must be <= {MAX_REQUEST_RETRIES}, got {retries}",
                    self.task_id
                )));
            }
        }

        for (key, value) in &self.inputs {
            if key.trim().is_empty() {
                return Err(FlowrunError::InvalidRequest(format!(
                    "task '{}': input variable names must not be empty",
                    self.task_id
                )));
            }
            check_depth(value, 1).map_err(|_| {
                FlowrunError::InvalidRequest(format!(
                    "task '{}': input '{key}' is nested too deep (max {MAX_INPUT_DEPTH})",
                    self.task_id
                ))
            })?;
        }

        Ok(())
    }
}

/// Validate a bare task identifier.
pub fn validate_task_id(task_id: &str) -> Result<()> {
    if task_id.is_empty() {
        return Err(FlowrunError::InvalidRequest(
            "task identifier must not be empty".to_string(),
        ));
    }
    if task_id.len() > MAX_TASK_ID_LEN {
        return Err(FlowrunError::InvalidRequest(format!(
            "task identifier is {} characters long (max {MAX_TASK_ID_LEN})",
            task_id.len()
        )));
    }
    if !TASK_ID_RE.is_match(task_id) {
        return Err(FlowrunError::InvalidRequest(format!(
            "task identifier '{task_id}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

fn check_depth(value: &Value, level: usize) -> std::result::Result<(), ()> {
    if level > MAX_INPUT_DEPTH {
        return Err(());
    }
    match value {
        Value::Array(items) => items.iter().try_for_each(|v| check_depth(v, level + 1)),
        Value::Object(map) => map.values().try_for_each(|v| check_depth(v, level + 1)),
        _ => Ok(()),
    }
}
