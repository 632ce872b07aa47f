// src/errors.rs

//! Crate-wide error types.
//!
//! Two families live here:
//! - [`FlowrunError`]: contract violations and setup failures (bad requests,
//!   invalid graphs, config problems). These are returned as `Err` from the
//!   public API *before* any execution starts.
//! - [`ProcessError`]: what can go wrong during a single invocation of the
//!   external flow host. These never escape the executors; they are folded
//!   into the terminal [`ExecutionResult`](crate::exec::ExecutionResult).

use std::time::Duration;

use thiserror::Error;

use crate::types::ExecutionStatus;

#[derive(Error, Debug)]
pub enum FlowrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in dependency graph involving task '{0}'")]
    CycleDetected(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    MissingDependency { task: String, dependency: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of one adapter invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("flow process timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    #[error("flow process exited with code {exit_code}: {stderr}")]
    Execution { exit_code: i32, stderr: String },

    #[error("failed to launch flow process: {0}")]
    Launch(String),

    #[error("could not parse flow output: {0}")]
    OutputParse(String),

    #[error("execution cancelled")]
    Cancelled,
}

impl ProcessError {
    /// Transient failures (timeouts, non-zero exits, launch problems) may be
    /// retried. Malformed output and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessError::Timeout { .. } | ProcessError::Execution { .. } | ProcessError::Launch(_)
        )
    }

    /// Status an execution ends with when this is its last error.
    pub fn terminal_status(&self) -> ExecutionStatus {
        match self {
            ProcessError::Timeout { .. } => ExecutionStatus::TimedOut,
            ProcessError::Cancelled => ExecutionStatus::Cancelled,
            ProcessError::Execution { .. }
            | ProcessError::Launch(_)
            | ProcessError::OutputParse(_) => ExecutionStatus::Failed,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowrunError>;
