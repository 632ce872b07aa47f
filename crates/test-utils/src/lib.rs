pub mod builders;
pub mod fake_adapter;

use std::sync::Once;
use std::time::Duration;

use flowrun::exec::{ProcessAdapter, RetryPolicy, SyncExecutor};
use flowrun::types::Variables;
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConfigFileBuilder, TaskConfigBuilder, chain_graph};
pub use fake_adapter::{Behaviour, ScriptedAdapter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=flowrun=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    with_timeout_secs(5, f).await
}

/// Run a future with a custom timeout.
pub async fn with_timeout_secs<F, T>(secs: u64, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(secs), f)
        .await
        .unwrap_or_else(|_| panic!("Test timed out after {secs} seconds"))
}

/// Retry policy with millisecond delays so retry tests stay fast.
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 10)
}

/// Sync executor over `adapter` with [`fast_retry_policy`].
pub fn fast_executor<A: ProcessAdapter>(adapter: A) -> SyncExecutor<A> {
    SyncExecutor::new(adapter, fast_retry_policy())
}

/// Build a variable map from literal pairs.
pub fn vars<const N: usize>(pairs: [(&str, Value); N]) -> Variables {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
