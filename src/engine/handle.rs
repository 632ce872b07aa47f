// src/engine/handle.rs

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::exec::ExecutionResult;
use crate::types::TaskId;

/// Handle to one submitted execution.
///
/// The spawned execution task is the completion channel: [`wait`](Self::wait)
/// yields its terminal [`ExecutionResult`]. Dropping the handle does not stop
/// the execution; call [`cancel`](Self::cancel) for that.
#[derive(Debug)]
pub struct ExecutionHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    join: JoinHandle<ExecutionResult>,
}

impl ExecutionHandle {
    pub(crate) fn new(task_id: TaskId, cancel: CancellationToken, join: JoinHandle<ExecutionResult>) -> Self {
        Self {
            task_id,
            cancel,
            join,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Request cancellation. A queued execution never starts; a running one
    /// has its process killed and ends as `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the terminal result.
    ///
    /// If the execution task itself died (a panicking adapter), a `Failed`
    /// result is synthesized so the caller still gets exactly one result.
    pub async fn wait(self) -> ExecutionResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                error!(task = %self.task_id, error = %e, "execution task aborted");
                ExecutionResult::rejected(self.task_id, format!("execution task aborted: {e}"))
            }
        }
    }
}
