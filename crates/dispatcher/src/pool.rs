//! A bounded pool for work that must stay off the request-handling path.
//!
//! The pool does not own threads. It owns `size` semaphore permits; every
//! job holds one while it runs on the tokio blocking pool (`run_blocking`) or
//! as a spawned task (`run_async`). Jobs beyond capacity wait for a permit.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("job was cancelled")]
    Cancelled,
}

impl From<JoinError> for PoolError {
    fn from(e: JoinError) -> Self {
        if e.is_panic() {
            let payload = e.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            PoolError::Panicked(message)
        } else {
            PoolError::Cancelled
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs a CPU-bound closure on the blocking pool once a permit is free.
    pub async fn run_blocking<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });
        Ok(handle.await?)
    }

    /// Runs an I/O-bound future as its own task once a permit is free.
    pub async fn run_async<F>(&self, job: F) -> Result<F::Output, PoolError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let handle = tokio::spawn(async move {
            let _permit = permit;
            job.await
        });
        Ok(handle.await?)
    }
}
