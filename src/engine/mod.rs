// src/engine/mod.rs

//! Concurrent orchestration on top of the synchronous executor.
//!
//! This module ties together:
//! - the [`limiter`] bounding in-flight executions
//! - [`handle`]s for single submissions (wait / cancel)
//! - the [`AsyncExecutor`] with its batch, pipeline and graph modes
//! - [`RunSummary`] aggregation for reporting
//!
//! Every mode reuses the retry/timeout semantics of
//! [`SyncExecutor`](crate::exec::SyncExecutor); nothing here talks to a
//! process directly.

pub mod async_executor;
pub mod handle;
pub mod limiter;
pub mod summary;

pub use async_executor::{AsyncExecutor, Callback};
pub use handle::ExecutionHandle;
pub use limiter::{ConcurrencyLimiter, ConcurrencyToken};
pub use summary::{RunSummary, TaskStats};
