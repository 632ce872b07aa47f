use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowrun::errors::ProcessError;
use flowrun::exec::{Invocation, InvokeFuture, ProcessAdapter};
use flowrun::types::Variables;

/// What a scripted invocation does.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Exit 0 with these outputs.
    Succeed(Variables),
    /// Exit non-zero.
    Fail { exit_code: i32 },
    /// Report a timeout straight away, without waiting.
    Timeout,
    /// Block until the deadline (-> Timeout) or cancellation (-> Cancelled).
    Hang,
    /// Exit 0 with unparseable stdout.
    BadOutput,
    /// Host program could not be started.
    LaunchFailure,
    /// Exit 0 and return the inputs as outputs.
    EchoInputs,
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub task_id: String,
    pub inputs: Variables,
    pub timeout: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<Behaviour>>>,
    defaults: Mutex<HashMap<String, Behaviour>>,
    delays: Mutex<HashMap<String, Duration>>,
    default_delay: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// A fake process adapter that:
/// - plays back per-task scripted outcomes (one per attempt, then a fallback)
/// - optionally sleeps before answering, honouring cancellation and timeout
/// - records every call and the peak number of concurrent invocations
///
/// Clones share state, so a test can keep one clone for assertions after
/// moving another into an executor.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdapter {
    inner: Arc<Inner>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fallback behaviour for `task` once its script (if any) is used up.
    pub fn on(self, task: &str, behaviour: Behaviour) -> Self {
        self.inner
            .defaults
            .lock()
            .unwrap()
            .insert(task.to_string(), behaviour);
        self
    }

    /// Per-attempt behaviours for `task`, consumed in order.
    pub fn script(self, task: &str, behaviours: Vec<Behaviour>) -> Self {
        self.inner
            .scripts
            .lock()
            .unwrap()
            .insert(task.to_string(), behaviours.into());
        self
    }

    pub fn with_delay(self, task: &str, delay: Duration) -> Self {
        self.inner
            .delays
            .lock()
            .unwrap()
            .insert(task.to_string(), delay);
        self
    }

    pub fn with_default_delay(self, delay: Duration) -> Self {
        *self.inner.default_delay.lock().unwrap() = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, task: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.task_id == task)
            .collect()
    }

    /// Task ids in invocation order.
    pub fn call_order(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.task_id).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    fn next_behaviour(&self, task: &str) -> Behaviour {
        if let Some(next) = self
            .inner
            .scripts
            .lock()
            .unwrap()
            .get_mut(task)
            .and_then(VecDeque::pop_front)
        {
            return next;
        }
        self.inner
            .defaults
            .lock()
            .unwrap()
            .get(task)
            .cloned()
            .unwrap_or(Behaviour::Succeed(Variables::new()))
    }

    fn delay_for(&self, task: &str) -> Duration {
        self.inner
            .delays
            .lock()
            .unwrap()
            .get(task)
            .copied()
            .unwrap_or_else(|| *self.inner.default_delay.lock().unwrap())
    }
}

/// Keeps the in-flight gauge honest on every exit path.
struct InFlightGuard<'a>(&'a Inner);

impl<'a> InFlightGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ProcessAdapter for ScriptedAdapter {
    fn invoke<'a>(&'a self, invocation: Invocation<'a>) -> InvokeFuture<'a> {
        Box::pin(async move {
            let _guard = InFlightGuard::enter(&self.inner);

            self.inner.calls.lock().unwrap().push(Call {
                task_id: invocation.task_id.to_string(),
                inputs: invocation.inputs.clone(),
                timeout: invocation.timeout,
            });

            let behaviour = self.next_behaviour(invocation.task_id);
            let delay = self.delay_for(invocation.task_id);

            if !delay.is_zero() {
                tokio::select! {
                    _ = invocation.cancel.cancelled() => return Err(ProcessError::Cancelled),
                    _ = tokio::time::sleep(invocation.timeout), if invocation.timeout < delay => {
                        return Err(ProcessError::Timeout { after: invocation.timeout });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match behaviour {
                Behaviour::Succeed(outputs) => Ok(outputs),
                Behaviour::EchoInputs => Ok(invocation.inputs.clone()),
                Behaviour::Fail { exit_code } => Err(ProcessError::Execution {
                    exit_code,
                    stderr: format!("scripted failure of {}", invocation.task_id),
                }),
                Behaviour::Timeout => Err(ProcessError::Timeout {
                    after: invocation.timeout,
                }),
                Behaviour::Hang => {
                    tokio::select! {
                        _ = invocation.cancel.cancelled() => Err(ProcessError::Cancelled),
                        _ = tokio::time::sleep(invocation.timeout) => Err(ProcessError::Timeout {
                            after: invocation.timeout,
                        }),
                    }
                }
                Behaviour::BadOutput => Err(ProcessError::OutputParse(
                    "scripted garbage on stdout".to_string(),
                )),
                Behaviour::LaunchFailure => Err(ProcessError::Launch(
                    "scripted launch failure".to_string(),
                )),
            }
        })
    }
}
