// src/exec/adapter.rs

//! Process adapter: runs one flow invocation in the external host.
//!
//! The executors talk to a [`ProcessAdapter`] rather than to
//! `tokio::process` directly, so tests can swap in a scripted double while
//! production uses [`HostProcessAdapter`].

use std::future::Future;
use std::path::PathBuf;
use std::collections::VecDeque;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ProcessError;
use crate::exec::output::parse_output;
use crate::types::Variables;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Everything an adapter needs for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub task_id: &'a str,
    pub inputs: &'a Variables,
    /// Hard wall-clock deadline for the process.
    pub timeout: Duration,
    /// Fires when the execution is cancelled; the adapter must stop the
    /// process and return [`ProcessError::Cancelled`].
    pub cancel: &'a CancellationToken,
}

pub type InvokeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Variables, ProcessError>> + Send + 'a>>;

/// Trait abstracting how a single flow invocation is performed.
pub trait ProcessAdapter: Send + Sync + 'static {
    /// Run the flow once and return its parsed output variables.
    ///
    /// Implementations must leave no process behind on any exit path.
    fn invoke<'a>(&'a self, invocation: Invocation<'a>) -> InvokeFuture<'a>;
}

/// Adapter that launches the configured host program:
///
/// `<program> [base_args...] --flow <task_id> --inputs <json>`
#[derive(Debug, Clone)]
pub struct HostProcessAdapter {
    program: PathBuf,
    base_args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl HostProcessAdapter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn run(&self, invocation: Invocation<'_>) -> Result<Variables, ProcessError> {
        let task_id = invocation.task_id;
        let inputs = serde_json::to_string(invocation.inputs)
            .map_err(|e| ProcessError::Launch(format!("serializing inputs: {e}")))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .arg("--flow")
            .arg(task_id)
            .arg("--inputs")
            .arg(&inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(task = %task_id, program = ?self.program, "spawning flow host process");

        let mut child = cmd.spawn().map_err(|e| {
            ProcessError::Launch(format!("spawning {:?} for '{task_id}': {e}", self.program))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut stdout_reader = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut out) = stdout {
                out.read_to_string(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        });

        // Always consume stderr so buffers don't fill; log at debug and keep a tail.
        let stderr_task = task_id.to_string();
        let mut stderr_reader = tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(err) = stderr {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %stderr_task, "stderr: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Vec::from(tail).join("\n")
        });

        // The deadline covers the pipes too: a background process can keep
        // stdout open after the host itself has exited.
        let deadline = Instant::now() + invocation.timeout;
        let outcome = tokio::select! {
            finished = collect(&mut child, &mut stdout_reader, &mut stderr_reader) => Some(finished),
            _ = tokio::time::sleep_until(deadline) => None,
            _ = invocation.cancel.cancelled() => {
                info!(task = %task_id, "cancellation requested; killing flow host process");
                terminate(&mut child, task_id).await;
                stdout_reader.abort();
                stderr_reader.abort();
                return Err(ProcessError::Cancelled);
            }
        };

        let Some(finished) = outcome else {
            warn!(
                task = %task_id,
                timeout_ms = millis(invocation.timeout),
                "flow host process exceeded its deadline; killing"
            );
            terminate(&mut child, task_id).await;
            stdout_reader.abort();
            stderr_reader.abort();
            return Err(ProcessError::Timeout { after: invocation.timeout });
        };

        let (status, stdout, stderr) = finished?;
        let code = status.code().unwrap_or(-1);
        info!(
            task = %task_id,
            exit_code = code,
            success = status.success(),
            "flow host process exited"
        );

        if !status.success() {
            return Err(ProcessError::Execution { exit_code: code, stderr });
        }

        parse_output(&stdout)
    }
}

impl ProcessAdapter for HostProcessAdapter {
    fn invoke<'a>(&'a self, invocation: Invocation<'a>) -> InvokeFuture<'a> {
        Box::pin(self.run(invocation))
    }
}

/// Wait for the host to exit and for both of its pipes to close.
async fn collect(
    child: &mut Child,
    stdout_reader: &mut JoinHandle<std::io::Result<String>>,
    stderr_reader: &mut JoinHandle<String>,
) -> Result<(ExitStatus, String, String), ProcessError> {
    let status = child
        .wait()
        .await
        .map_err(|e| ProcessError::Launch(format!("waiting for flow host process: {e}")))?;

    let stdout = match stdout_reader.await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => return Err(ProcessError::Launch(format!("reading stdout: {e}"))),
        Err(e) => return Err(ProcessError::Launch(format!("stdout reader failed: {e}"))),
    };
    let stderr = stderr_reader.await.unwrap_or_default();

    Ok((status, stdout, stderr))
}

/// Kill the child (unless it already exited) and wait for it so it is reaped.
async fn terminate(child: &mut Child, task_id: &str) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(task = %task_id, error = %e, "failed to kill flow host process");
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
