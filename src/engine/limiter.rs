// src/engine/limiter.rs

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::errors::{FlowrunError, Result};

/// Counting semaphore bounding the number of in-flight executions.
///
/// Cloning is cheap and shares the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of concurrency capacity.
///
/// The permit goes back to the limiter when the token is dropped, so every
/// exit path (success, failure, timeout, cancellation, panic) releases it.
#[derive(Debug)]
pub struct ConcurrencyToken {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyToken {
    /// Give the permit back now.
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FlowrunError::ConfigError(
                "concurrency limit must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait until a permit is available.
    pub async fn acquire(&self) -> Result<ConcurrencyToken> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("concurrency limiter closed unexpectedly"))?;
        Ok(ConcurrencyToken { _permit: permit })
    }

    /// Wait for a permit unless `cancel` fires first.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Option<ConcurrencyToken> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            token = self.acquire() => token.ok(),
        }
    }

    pub fn try_acquire(&self) -> Option<ConcurrencyToken> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| ConcurrencyToken { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.available_permits()
    }
}
