// src/exec/sync_executor.rs

//! Single-execution runner: adapter + retry policy.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{ProcessError, Result};
use crate::exec::adapter::{Invocation, ProcessAdapter, millis};
use crate::exec::request::ExecutionRequest;
use crate::exec::result::ExecutionResult;
use crate::exec::retry::RetryPolicy;
use crate::types::{ExecutionStatus, Variables};

/// Timeout used when neither the request nor the executor sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs one request to completion, retrying transient failures.
///
/// State machine: `Running -> {Success, Failed, TimedOut}`, with
/// `Running -> Cancelled` possible at any point. Execution-time failures are
/// encoded in the returned [`ExecutionResult`]; only a request that breaks
/// the caller contract yields `Err`.
#[derive(Debug)]
pub struct SyncExecutor<A: ProcessAdapter> {
    adapter: A,
    retry: RetryPolicy,
    default_timeout: Duration,
    default_retries: u32,
}

impl<A: ProcessAdapter> SyncExecutor<A> {
    pub fn new(adapter: A, retry: RetryPolicy) -> Self {
        Self {
            adapter,
            retry,
            default_timeout: DEFAULT_TIMEOUT,
            default_retries: 0,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Validate and run `request` until it reaches a terminal status.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.execute_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but `cancel` pre-empts the current
    /// invocation or backoff wait and ends the execution as `Cancelled`.
    pub async fn execute_cancellable(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        request.validate()?;
        Ok(self.run(request, cancel).await)
    }

    /// Blocking convenience for callers outside any async runtime.
    ///
    /// Builds a private current-thread runtime; must not be called from
    /// within a Tokio runtime.
    pub fn execute_blocking(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.execute(request))
    }

    /// Core attempt loop. Assumes `request` has been validated.
    pub(crate) async fn run(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        let task_id = request.task_id();
        let timeout = request.timeout().unwrap_or(self.default_timeout);
        let max_retries = self
            .retry
            .effective_limit(request.max_retries().unwrap_or(self.default_retries));

        info!(
            task = %task_id,
            %execution_id,
            status = %ExecutionStatus::Running,
            timeout_ms = millis(timeout),
            max_retries,
            "starting flow execution"
        );

        let mut attempt: u32 = 0;
        let mut invocations: u32 = 0;

        let outcome: std::result::Result<Variables, ProcessError> = loop {
            if cancel.is_cancelled() {
                break Err(ProcessError::Cancelled);
            }

            debug!(task = %task_id, %execution_id, attempt, "invoking flow host");
            invocations += 1;

            let invocation = Invocation {
                task_id,
                inputs: request.inputs(),
                timeout,
                cancel,
            };

            match self.adapter.invoke(invocation).await {
                Ok(output) => break Ok(output),
                Err(err) => {
                    if !self.retry.should_retry(attempt, max_retries, &err) {
                        break Err(err);
                    }

                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        task = %task_id,
                        %execution_id,
                        attempt,
                        tentative_status = %err.terminal_status(),
                        delay_ms = millis(delay),
                        error = %err,
                        "attempt failed; retrying after backoff"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break Err(ProcessError::Cancelled),
                    }
                    attempt += 1;
                }
            }
        };

        let finished_at = Utc::now();
        let duration = clock.elapsed();
        let retry_attempts = invocations.saturating_sub(1);

        let result = match outcome {
            Ok(output) => ExecutionResult {
                task_id: task_id.to_string(),
                status: ExecutionStatus::Success,
                started_at,
                finished_at,
                duration,
                output,
                error: None,
                execution_id,
                retry_attempts,
                attempts: invocations,
            },
            Err(err) => ExecutionResult {
                task_id: task_id.to_string(),
                status: err.terminal_status(),
                started_at,
                finished_at,
                duration,
                output: Variables::new(),
                error: Some(err.to_string()),
                execution_id,
                retry_attempts,
                attempts: invocations,
            },
        };

        if result.is_success() {
            info!(
                task = %task_id,
                %execution_id,
                duration_ms = millis(duration),
                retry_attempts,
                "flow execution succeeded"
            );
        } else {
            warn!(
                task = %task_id,
                %execution_id,
                status = %result.status,
                attempts = invocations,
                error = result.error.as_deref().unwrap_or_default(),
                "flow execution did not succeed"
            );
        }

        result
    }
}
