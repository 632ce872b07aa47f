// tests/submit_and_cancel.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowrun::engine::AsyncExecutor;
use flowrun::errors::FlowrunError;
use flowrun::exec::ExecutionRequest;
use flowrun::types::{ExecutionStatus, Variables};
use flowrun_test_utils::{Behaviour, ScriptedAdapter, fast_executor, init_tracing, vars, with_timeout};
use serde_json::json;

fn executor(adapter: &ScriptedAdapter, limit: usize) -> AsyncExecutor<ScriptedAdapter> {
    AsyncExecutor::new(fast_executor(adapter.clone()), limit).unwrap()
}

fn request(task: &str) -> ExecutionRequest {
    ExecutionRequest::new(task, Variables::new())
}

/// Poll until the adapter reports `n` running invocations.
async fn wait_for_in_flight(adapter: &ScriptedAdapter, n: usize) {
    while adapter.in_flight() < n {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_submit_returns_immediately_and_wait_yields_result() {
    init_tracing();
    let adapter = ScriptedAdapter::new()
        .on("Job", Behaviour::Succeed(vars([("done", json!(true))])))
        .with_delay("Job", Duration::from_millis(50));
    let executor = executor(&adapter, 2);

    let handle = executor.submit(request("Job")).unwrap();
    assert_eq!(handle.task_id(), "Job");
    assert!(!handle.is_finished());

    let result = with_timeout(handle.wait()).await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.output["done"], json!(true));
    assert_eq!(executor.limiter().available_permits(), 2);
}

#[tokio::test]
async fn test_callback_sees_result_before_wait_returns() {
    init_tracing();
    let adapter = ScriptedAdapter::new().on("Job", Behaviour::Fail { exit_code: 9 });
    let executor = executor(&adapter, 1);

    let seen: Arc<Mutex<Option<(ExecutionStatus, bool)>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let limiter = executor.limiter().clone();

    let handle = executor
        .submit_with_callback(request("Job"), move |result| {
            // The permit is still held while the callback runs.
            let holding = limiter.available_permits() == 0;
            *sink.lock().unwrap() = Some((result.status, holding));
        })
        .unwrap();
    let result = with_timeout(handle.wait()).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(*seen.lock().unwrap(), Some((ExecutionStatus::Failed, true)));
    assert_eq!(executor.limiter().available_permits(), 1);
}

#[tokio::test]
async fn test_panicking_callback_does_not_lose_result() {
    init_tracing();
    let adapter = ScriptedAdapter::new();
    let executor = executor(&adapter, 1);

    let handle = executor
        .submit_with_callback(request("Job"), |_| panic!("callback blew up"))
        .unwrap();
    let result = with_timeout(handle.wait()).await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(executor.limiter().available_permits(), 1);
}

#[tokio::test]
async fn test_cancel_running_execution() {
    init_tracing();
    let adapter = ScriptedAdapter::new().on("Forever", Behaviour::Hang);
    let executor = executor(&adapter, 1);

    let handle = executor.submit(request("Forever").with_max_retries(3)).unwrap();
    with_timeout(wait_for_in_flight(&adapter, 1)).await;

    handle.cancel();
    let result = with_timeout(handle.wait()).await;

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.attempts, 1);
    assert_eq!(adapter.in_flight(), 0);
    assert_eq!(executor.limiter().available_permits(), 1);
}

#[tokio::test]
async fn test_cancel_queued_execution_never_starts_it() {
    init_tracing();
    let adapter = ScriptedAdapter::new().on("Blocker", Behaviour::Hang);
    let executor = executor(&adapter, 1);

    let blocker = executor.submit(request("Blocker")).unwrap();
    with_timeout(wait_for_in_flight(&adapter, 1)).await;

    let queued = executor.submit(request("Queued")).unwrap();
    queued.cancel();
    let queued_result = with_timeout(queued.wait()).await;

    assert_eq!(queued_result.status, ExecutionStatus::Cancelled);
    assert_eq!(queued_result.attempts, 0);
    assert!(adapter.calls_for("Queued").is_empty());

    blocker.cancel();
    assert_eq!(with_timeout(blocker.wait()).await.status, ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn test_shutdown_cancels_everything_outstanding() {
    init_tracing();
    let adapter = ScriptedAdapter::new().with_default_delay(Duration::from_secs(60));
    let executor = executor(&adapter, 2);

    let handles: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|t| executor.submit(request(t)).unwrap())
        .collect();
    with_timeout(wait_for_in_flight(&adapter, 2)).await;

    executor.shutdown();
    assert!(executor.shutdown_token().is_cancelled());

    for handle in handles {
        let result = with_timeout(handle.wait()).await;
        assert_eq!(result.status, ExecutionStatus::Cancelled);
    }
    assert_eq!(adapter.call_count(), 2);
    assert_eq!(executor.limiter().available_permits(), 2);
}

#[tokio::test]
async fn test_submit_rejects_invalid_request() {
    init_tracing();
    let adapter = ScriptedAdapter::new();
    let executor = executor(&adapter, 1);

    let err = executor.submit(request("")).unwrap_err();

    assert!(matches!(err, FlowrunError::InvalidRequest(_)));
    assert_eq!(adapter.call_count(), 0);
}

#[tokio::test]
async fn test_limiter_tokens_release_on_drop() {
    let adapter = ScriptedAdapter::new();
    let executor = executor(&adapter, 2);
    let limiter = executor.limiter();

    let first = limiter.acquire().await.unwrap();
    let second = limiter.try_acquire().unwrap();
    assert_eq!(limiter.in_flight(), 2);
    assert!(limiter.try_acquire().is_none());

    first.release();
    drop(second);
    assert_eq!(limiter.available_permits(), limiter.capacity());
}
