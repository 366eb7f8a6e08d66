//! Bounded worker pool for blocking and external work
//!
//! Database writes and external vendor lookups must never run on the ingest
//! path directly. Each job first takes a permit; when all permits are out the
//! caller waits, which applies backpressure to the scan worker that asked.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is closed")]
    Closed,

    #[error("Pool task failed: {message}")]
    TaskFailed { message: String },
}

impl crate::core::error_handling::ContextualError for PoolError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Shared handle to a fixed number of work permits
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` concurrent slots (at least one)
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

    /// Number of idle slots right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run a blocking closure on the blocking thread pool under a permit
    pub async fn run_blocking<F, T>(&self, job: F) -> PoolResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        handle.await.map_err(|e| PoolError::TaskFailed {
            message: e.to_string(),
        })
    }

    /// Run an async job (for example an HTTP lookup) under a permit
    pub async fn run<Fut, T>(&self, job: Fut) -> PoolResult<T>
    where
        Fut: Future<Output = T>,
    {
        let _permit = self.permits.acquire().await.map_err(|_| PoolError::Closed)?;
        Ok(job.await)
    }

    /// Refuse new work; jobs already holding a permit finish normally
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let pool = WorkerPool::new(2);
        let value = pool.run_blocking(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_zero_size_is_clamped() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_size() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                pool.run_blocking(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_work() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(pool.is_closed());
        assert!(matches!(pool.run(async { 1 }).await, Err(PoolError::Closed)));
        assert!(matches!(
            pool.run_blocking(|| 1).await,
            Err(PoolError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let pool = WorkerPool::new(1);
        let result = pool.run_blocking(|| -> u32 { panic!("boom") }).await;
        assert!(matches!(result, Err(PoolError::TaskFailed { .. })));
        // permit was released by the unwinding closure
        assert_eq!(pool.run_blocking(|| 1).await.unwrap(), 1);
    }
}
