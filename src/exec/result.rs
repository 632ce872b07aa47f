// src/exec/result.rs

//! Terminal execution records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::types::{ExecutionStatus, TaskId, Variables};

/// Final outcome of one execution (one attempt sequence, retries included).
///
/// Built exactly once, when the execution ends, and never mutated after
/// that. Collaborators (reporting, metrics) receive it by value or by shared
/// reference and must treat it as read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub task_id: TaskId,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub output: Variables,
    /// Present iff the status is `Failed`, `TimedOut` or `Cancelled`.
    pub error: Option<String>,
    pub execution_id: Uuid,
    /// Retries consumed after the first attempt.
    pub retry_attempts: u32,
    /// Adapter invocations actually made (0 if never started).
    pub attempts: u32,
}

impl ExecutionResult {
    /// Marker for a request that was never launched.
    pub fn cancelled(task_id: impl Into<TaskId>, reason: impl Into<String>) -> Self {
        Self::not_run(task_id.into(), ExecutionStatus::Cancelled, reason.into())
    }

    /// Failed result for a request that could not be run at all.
    pub fn rejected(task_id: impl Into<TaskId>, reason: impl Into<String>) -> Self {
        Self::not_run(task_id.into(), ExecutionStatus::Failed, reason.into())
    }

    fn not_run(task_id: TaskId, status: ExecutionStatus, reason: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status,
            started_at: now,
            finished_at: now,
            duration: Duration::ZERO,
            output: Variables::new(),
            error: Some(reason),
            execution_id: Uuid::new_v4(),
            retry_attempts: 0,
            attempts: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
