//! Worker contract: lifecycle hooks implemented by job-specific logic.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use super::executor::ExecutorStats;
use super::queue::Task;
use crate::jobs::identity::Identity;
use crate::jobs::status::Status;

/// Return value of a worker's `work()` call; drives the next status and
/// whether a follow-up command is scheduled.
#[derive(Debug)]
pub enum WorkResult {
    /// Unit processed; pull the next one
    Next,
    /// Unit processed and more work is known to be waiting
    More,
    /// All work finished; the job should complete
    Done,
    /// Unit failed; the job should fail with this error
    Fail(anyhow::Error),
    /// Processed, but pause and resume after this many seconds
    Delay(u64),
}

impl WorkResult {
    /// Shorthand failure constructor
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(anyhow::anyhow!(message.into()))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Narrowed view of the owning job handed to a worker at init: its own
/// identity plus the shared execution counters. Workers never see the
/// job's coordinator or status.
#[derive(Clone)]
pub struct WorkerContext {
    pub identity: Identity,
    pub stats: Arc<ExecutorStats>,
}

/// Executable handler bound to a job, processing tasks pulled from a queue.
///
/// `status()` is the worker's availability self-report consumed by the
/// registry; the job-level [`Status`] is owned by the job's runner loop.
#[async_trait]
pub trait Worker: Send + Sync {
    fn identity(&self) -> &Identity;

    /// Current self-reported status; `Started`/`Running` mean available
    fn status(&self) -> Status;

    /// One-time setup before any work is processed
    async fn init(&self, _context: &WorkerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Process one unit of work
    async fn work(&self, task: &Task) -> WorkResult;

    /// Re-entry hook after a pause/delay cycle
    async fn resume(&self, _reason: &str, _task: Option<&Task>) -> WorkResult {
        WorkResult::Next
    }

    /// Called exactly once when the job completes
    async fn done(&self) {}

    /// Called with the captured error when the job fails
    async fn fail(&self, _error: &anyhow::Error) {}
}

/// Shared status slot for worker implementations that self-report
/// availability to the registry.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: RwLock<Status>,
}

impl StatusCell {
    pub fn new(status: Status) -> Self {
        Self {
            inner: RwLock::new(status),
        }
    }

    pub fn get(&self) -> Status {
        *self.inner.read()
    }

    pub fn set(&self, status: Status) {
        *self.inner.write() = status;
    }
}
