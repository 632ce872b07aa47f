// src/engine/summary.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::exec::ExecutionResult;
use crate::types::{ExecutionStatus, TaskId};

/// Aggregate counts over a set of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    /// Retries consumed across all executions.
    pub retries: u32,
    /// Sum of per-execution wall time.
    #[serde(rename = "busy_secs", serialize_with = "serialize_secs")]
    pub busy_time: Duration,
    /// Timing per flow, for executions that actually invoked the host.
    pub per_task: BTreeMap<TaskId, TaskStats>,
}

/// Execution count and duration spread for one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub executions: usize,
    pub succeeded: usize,
    #[serde(rename = "total_secs", serialize_with = "serialize_secs")]
    pub total_duration: Duration,
    #[serde(rename = "min_secs", serialize_with = "serialize_secs")]
    pub min_duration: Duration,
    #[serde(rename = "max_secs", serialize_with = "serialize_secs")]
    pub max_duration: Duration,
}

impl TaskStats {
    fn first(result: &ExecutionResult) -> Self {
        Self {
            executions: 1,
            succeeded: usize::from(result.is_success()),
            total_duration: result.duration,
            min_duration: result.duration,
            max_duration: result.duration,
        }
    }

    fn record(&mut self, result: &ExecutionResult) {
        self.executions += 1;
        self.succeeded += usize::from(result.is_success());
        self.total_duration += result.duration;
        self.min_duration = self.min_duration.min(result.duration);
        self.max_duration = self.max_duration.max(result.duration);
    }

    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.executions) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_duration / n,
            Err(_) => Duration::ZERO,
        }
    }
}

impl RunSummary {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ExecutionResult>,
    {
        let mut summary = RunSummary::default();
        for result in results {
            summary.total += 1;
            match result.status {
                ExecutionStatus::Success => summary.succeeded += 1,
                ExecutionStatus::Failed => summary.failed += 1,
                ExecutionStatus::TimedOut => summary.timed_out += 1,
                ExecutionStatus::Cancelled => summary.cancelled += 1,
                ExecutionStatus::Pending | ExecutionStatus::Running => {}
            }
            summary.retries += result.retry_attempts;
            summary.busy_time += result.duration;

            // Never-started markers would drag the minimum to zero.
            if result.attempts == 0 {
                continue;
            }
            summary
                .per_task
                .entry(result.task_id.clone())
                .and_modify(|stats| stats.record(result))
                .or_insert_with(|| TaskStats::first(result));
        }
        summary
    }

    /// Fraction of executions that succeeded; 1.0 for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.succeeded as f64 / self.total as f64
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
