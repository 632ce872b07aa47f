// src/engine/async_executor.rs

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::{DagScheduler, DependencyGraph, DependencyResolver};
use crate::engine::handle::ExecutionHandle;
use crate::engine::limiter::ConcurrencyLimiter;
use crate::engine::summary::RunSummary;
use crate::errors::Result;
use crate::exec::{ExecutionRequest, ExecutionResult, ProcessAdapter, SyncExecutor};
use crate::types::{TaskId, Variables};

/// Completion callback for single submissions.
pub type Callback = Box<dyn FnOnce(&ExecutionResult) + Send + 'static>;

/// Concurrent front-end over a [`SyncExecutor`].
///
/// All four modes (single, batch, pipeline, graph) share one
/// [`ConcurrencyLimiter`], so the number of in-flight invocations never
/// exceeds its capacity. Every submission runs under a child of one shutdown
/// token; [`shutdown`](Self::shutdown) cancels everything.
#[derive(Debug)]
pub struct AsyncExecutor<A: ProcessAdapter> {
    executor: Arc<SyncExecutor<A>>,
    limiter: ConcurrencyLimiter,
    shutdown: CancellationToken,
}

impl<A: ProcessAdapter> AsyncExecutor<A> {
    pub fn new(executor: SyncExecutor<A>, max_concurrent: usize) -> Result<Self> {
        Ok(Self {
            executor: Arc::new(executor),
            limiter: ConcurrencyLimiter::new(max_concurrent)?,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn sync_executor(&self) -> &SyncExecutor<A> {
        &self.executor
    }

    /// Token that fires when the executor shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel every queued and in-flight execution.
    pub fn shutdown(&self) {
        info!("shutting down executor; cancelling outstanding executions");
        self.shutdown.cancel();
    }

    /// Submit one request without blocking the caller.
    pub fn submit(&self, request: ExecutionRequest) -> Result<ExecutionHandle> {
        self.spawn_execution(request, None)
    }

    /// Like [`submit`](Self::submit), invoking `callback` with the result
    /// before the concurrency permit is released.
    pub fn submit_with_callback<F>(&self, request: ExecutionRequest, callback: F) -> Result<ExecutionHandle>
    where
        F: FnOnce(&ExecutionResult) + Send + 'static,
    {
        self.spawn_execution(request, Some(Box::new(callback)))
    }

    fn spawn_execution(&self, request: ExecutionRequest, callback: Option<Callback>) -> Result<ExecutionHandle> {
        request.validate()?;

        let cancel = self.shutdown.child_token();
        let task_cancel = cancel.clone();
        let executor = Arc::clone(&self.executor);
        let limiter = self.limiter.clone();
        let task_id = request.task_id().to_string();

        let join = tokio::spawn(async move {
            let Some(token) = limiter.acquire_or_cancel(&task_cancel).await else {
                debug!(task = %request.task_id(), "cancelled while waiting for a permit");
                let result = ExecutionResult::cancelled(
                    request.task_id(),
                    "cancelled before a concurrency permit was granted",
                );
                notify(callback, &result);
                return result;
            };

            let result = executor.run(&request, &task_cancel).await;
            notify(callback, &result);
            token.release();
            result
        });

        Ok(ExecutionHandle::new(task_id, cancel, join))
    }

    /// Run independent requests in parallel, bounded by the limiter.
    ///
    /// Results come back in submission order, one per request. With
    /// `fail_fast`, the first `Failed`/`TimedOut` result stops further
    /// launches: requests not yet started get a `Cancelled` marker, while
    /// siblings already running are awaited and their results kept.
    pub async fn execute_batch(&self, requests: Vec<ExecutionRequest>, fail_fast: bool) -> Result<Vec<ExecutionResult>> {
        for request in &requests {
            request.validate()?;
        }

        let total = requests.len();
        info!(total, fail_fast, "starting batch execution");

        let batch_cancel = self.shutdown.child_token();
        let mut slots: Vec<Slot> = Vec::with_capacity(total);

        for request in requests {
            let token = tokio::select! {
                biased;
                _ = batch_cancel.cancelled() => None,
                token = self.limiter.acquire() => Some(token?),
            };

            let token = match token {
                Some(token) if !batch_cancel.is_cancelled() => token,
                _ => {
                    debug!(task = %request.task_id(), "batch aborted; not launching");
                    slots.push(Slot::Skipped(ExecutionResult::cancelled(
                        request.task_id(),
                        "not started: batch aborted",
                    )));
                    continue;
                }
            };

            // In-flight members are not pre-empted by fail-fast, only by shutdown.
            let cancel = self.shutdown.child_token();
            let task_cancel = cancel.clone();
            let trip = batch_cancel.clone();
            let executor = Arc::clone(&self.executor);
            let task_id = request.task_id().to_string();

            let join = tokio::spawn(async move {
                let result = executor.run(&request, &task_cancel).await;
                if fail_fast && result.status.is_failure() {
                    warn!(task = %result.task_id, status = %result.status, "fail-fast: aborting remaining batch members");
                    trip.cancel();
                }
                token.release();
                result
            });

            slots.push(Slot::Launched(ExecutionHandle::new(task_id, cancel, join)));
        }

        let mut results = Vec::with_capacity(total);
        for slot in slots {
            results.push(match slot {
                Slot::Launched(handle) => handle.wait().await,
                Slot::Skipped(result) => result,
            });
        }

        let summary = RunSummary::from_results(&results);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            cancelled = summary.cancelled,
            "batch execution finished"
        );

        Ok(results)
    }

    /// Run requests one at a time, in order.
    ///
    /// With `pass_output`, the outputs of each successful step are merged
    /// into the next step's inputs (the step's own inputs win on conflicts).
    /// The first unsuccessful step halts the pipeline; every later step is
    /// reported as `Cancelled` without being run.
    pub async fn execute_pipeline(&self, steps: Vec<ExecutionRequest>, pass_output: bool) -> Result<Vec<ExecutionResult>> {
        for step in &steps {
            step.validate()?;
        }

        info!(steps = steps.len(), pass_output, "starting pipeline execution");

        let mut results = Vec::with_capacity(steps.len());
        let mut halted_at: Option<TaskId> = None;
        let mut carried: Option<Variables> = None;

        for (position, step) in steps.into_iter().enumerate() {
            if let Some(failed) = &halted_at {
                results.push(ExecutionResult::cancelled(
                    step.task_id(),
                    format!("not executed: pipeline halted at step '{failed}'"),
                ));
                continue;
            }

            let step = match (pass_output, carried.take()) {
                (true, Some(upstream)) => step.with_upstream_outputs(upstream),
                _ => step,
            };

            debug!(position, task = %step.task_id(), "running pipeline step");

            let result = match self.submit(step.clone()) {
                Ok(handle) => handle.wait().await,
                // Merged inputs can break the input contract even though the
                // step on its own was valid.
                Err(e) => ExecutionResult::rejected(step.task_id(), format!("merged inputs rejected: {e}")),
            };

            if result.is_success() {
                carried = Some(result.output.clone());
            } else {
                warn!(
                    position,
                    task = %result.task_id,
                    status = %result.status,
                    "pipeline stopped at failing step"
                );
                halted_at = Some(result.task_id.clone());
            }
            results.push(result);
        }

        Ok(results)
    }

    /// Run a dependency graph.
    ///
    /// The graph is validated first; a cyclic or dangling graph returns `Err`
    /// before anything runs. Execution proceeds in rounds: every ready node
    /// is released through the batch path, then outcomes are recorded. A
    /// node that does not succeed cancels all of its transitive dependents.
    /// The returned map holds exactly one result per node id.
    pub async fn execute_graph(&self, graph: DependencyGraph) -> Result<BTreeMap<TaskId, ExecutionResult>> {
        let resolved = DependencyResolver::validate(graph)?;
        for idx in resolved.indices() {
            resolved.node(idx).request.validate()?;
        }

        info!(nodes = resolved.len(), "starting dependency graph execution");

        let mut scheduler = DagScheduler::new(&resolved);
        let mut results: BTreeMap<TaskId, ExecutionResult> = BTreeMap::new();
        let mut round = 0usize;

        loop {
            let ready = scheduler.next_ready();
            if ready.is_empty() {
                break;
            }
            round += 1;

            let names: Vec<&str> = ready.iter().map(|&idx| resolved.node(idx).id.as_str()).collect();
            info!(round, nodes = ?names, "releasing ready nodes");

            let requests = ready
                .iter()
                .map(|&idx| resolved.node(idx).request.clone())
                .collect();
            let outcomes = self.execute_batch(requests, false).await?;

            for (idx, result) in ready.into_iter().zip(outcomes) {
                let node_id = resolved.node(idx).id.clone();
                if result.is_success() {
                    scheduler.mark_succeeded(idx);
                } else {
                    for dependent in scheduler.mark_failed(idx) {
                        let node = resolved.node(dependent);
                        results.insert(
                            node.id.clone(),
                            ExecutionResult::cancelled(
                                node.request.task_id(),
                                format!("cancelled: dependency '{node_id}' did not succeed"),
                            ),
                        );
                    }
                }
                results.insert(node_id, result);
            }
        }

        for idx in scheduler.cancel_remaining() {
            let node = resolved.node(idx);
            results.insert(
                node.id.clone(),
                ExecutionResult::cancelled(node.request.task_id(), "cancelled: dependencies never completed"),
            );
        }

        let summary = RunSummary::from_results(results.values());
        info!(
            rounds = round,
            total = summary.total,
            succeeded = summary.succeeded,
            cancelled = summary.cancelled,
            "dependency graph execution finished"
        );

        Ok(results)
    }
}

enum Slot {
    Launched(ExecutionHandle),
    Skipped(ExecutionResult),
}

fn notify(callback: Option<Callback>, result: &ExecutionResult) {
    let Some(callback) = callback else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
        error!(task = %result.task_id, "completion callback panicked");
    }
}
