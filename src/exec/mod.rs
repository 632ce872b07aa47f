// src/exec/mod.rs

//! Execution layer for a single flow.
//!
//! - [`adapter`] owns the external host process: launch, deadline, output
//!   capture. [`HostProcessAdapter`] is the production implementation of the
//!   [`ProcessAdapter`] trait.
//! - [`output`] parses the host's stdout into output variables.
//! - [`retry`] is the pure retry/backoff decision function.
//! - [`sync_executor`] composes the two into "run one request to a terminal
//!   result".
//! - [`request`] / [`result`] hold the data passed in and handed back.

pub mod adapter;
pub mod output;
pub mod request;
pub mod result;
pub mod retry;
pub mod sync_executor;

pub use adapter::{HostProcessAdapter, Invocation, InvokeFuture, ProcessAdapter, millis};
pub use output::parse_output;
pub use request::ExecutionRequest;
pub use result::ExecutionResult;
pub use retry::{ABSOLUTE_MAX_RETRIES, RetryPolicy};
pub use sync_executor::SyncExecutor;
