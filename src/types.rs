use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exec::ExecutionRequest;

/// Canonical task (flow) identifier used throughout the engine.
pub type TaskId = String;

/// Input or output variables of a flow.
///
/// Keys are sorted so the serialized form handed to the host is stable.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Lifecycle status of an execution.
///
/// Results handed back by the executors always carry one of the terminal
/// statuses; `Pending` and `Running` only appear in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }

    pub fn is_success(self) -> bool {
        self == ExecutionStatus::Success
    }

    /// `Failed` or `TimedOut`: the outcomes that trip fail-fast batches.
    pub fn is_failure(self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::TimedOut => "timed_out",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            "timed_out" | "timeout" => Ok(ExecutionStatus::TimedOut),
            "cancelled" | "canceled" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("invalid execution status: {other}")),
        }
    }
}

/// A resolved task descriptor as supplied by the task-storage side.
///
/// The engine does not care where this came from; it only needs the
/// canonical identifier plus the defaults to fill into a request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub inputs: Variables,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            inputs: Variables::new(),
            timeout: None,
            retries: None,
        }
    }

    /// Build an (unvalidated) execution request carrying this descriptor's
    /// defaults.
    pub fn to_request(&self) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(self.id.clone(), self.inputs.clone());
        if let Some(timeout) = self.timeout {
            request = request.with_timeout(timeout);
        }
        if let Some(retries) = self.retries {
            request = request.with_max_retries(retries);
        }
        request
    }
}
