//! Bounded execution pool for batch processing.
//!
//! Concurrency is bounded by a semaphore; total admitted-but-unfinished work
//! is bounded by the pending counter, which is the backpressure signal the
//! manager checks before pulling another batch.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum batches executing at once
    pub max_concurrency: usize,
    /// Pending-queue bound above which submissions are refused
    pub pending_bound: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: crate::constants::system::DEFAULT_POOL_CONCURRENCY,
            pending_bound: crate::constants::system::DEFAULT_POOL_PENDING_BOUND,
        }
    }
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool pending queue is at its bound of {pending_bound}")]
    Saturated { pending_bound: usize },
}

/// Worker pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub pending: usize,
    pub submitted: u64,
    pub completed: u64,
    pub rejected: u64,
}

/// Bounded thread pool for (batch, worker) execution
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    submitted: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            pending: Arc::new(AtomicUsize::new(0)),
            submitted: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Whether the pending queue has reached its configured bound
    pub fn is_saturated(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.config.pending_bound
    }

    /// Submit a batch future; refused when the pending queue is at its bound
    pub fn submit<F>(&self, batch: F) -> Result<JoinHandle<()>, PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_saturated() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Saturated {
                pending_bound: self.config.pending_bound,
            });
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let semaphore = Arc::clone(&self.semaphore);
        let pending = Arc::clone(&self.pending);
        let completed = Arc::clone(&self.completed);

        Ok(tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            if permit.is_ok() {
                batch.await;
            }
            pending.fetch_sub(1, Ordering::AcqRel);
            completed.fetch_add(1, Ordering::Relaxed);
        }))
    }

    /// Wait until every admitted batch has finished
    pub async fn drain(&self) {
        while self.pending.load(Ordering::Acquire) > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        debug!("worker pool drained");
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pending: self.pending.load(Ordering::Acquire),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(WorkerPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_submission_and_drain() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_concurrency: 2,
            pending_bound: 8,
        });

        for _ in 0..4 {
            pool.submit(async {}).unwrap();
        }
        pool.drain().await;

        let stats = pool.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.completed, 4);
    }

    #[tokio::test]
    async fn test_saturation_refuses_submission() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_concurrency: 1,
            pending_bound: 2,
        });

        let (release_tx, release_rx) = oneshot::channel::<()>();
        pool.submit(async move {
            let _ = release_rx.await;
        })
        .unwrap();
        pool.submit(async {}).unwrap();

        assert!(pool.is_saturated());
        let refused = pool.submit(async {});
        assert!(matches!(refused, Err(PoolError::Saturated { .. })));
        assert_eq!(pool.stats().rejected, 1);

        release_tx.send(()).unwrap();
        pool.drain().await;
        assert!(!pool.is_saturated());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_concurrency: 2,
            pending_bound: 16,
        });

        let peak = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let peak = Arc::clone(&peak);
            let active = Arc::clone(&active);
            pool.submit(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.drain().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
