//! # System Constants
//!
//! Core constants and enums that define the operational boundaries of the
//! job/worker orchestration engine.

// Re-export state types for convenience
pub use crate::jobs::status::Status;

/// Core system events emitted on state transitions and orchestration actions
pub mod events {
    // Job lifecycle events
    pub const JOB_STARTING: &str = "job.starting";
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_RUNNING: &str = "job.running";
    pub const JOB_PAUSED: &str = "job.paused";
    pub const JOB_STOPPED: &str = "job.stopped";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_FAILED: &str = "job.failed";
    pub const JOB_KILLED: &str = "job.killed";
    pub const JOB_CHECKED: &str = "job.checked";

    // Worker lifecycle events
    pub const WORKER_STARTED: &str = "worker.started";
    pub const WORKER_RESUMED: &str = "worker.resumed";
    pub const WORKER_FAILED: &str = "worker.failed";

    // Manager/pool events
    pub const BATCH_SUBMITTED: &str = "manager.batch_submitted";
    pub const BATCH_HELD: &str = "manager.batch_held";
    pub const POOL_SATURATED: &str = "manager.pool_saturated";
}

/// Status groupings used by orchestration decisions
pub mod status_groups {
    use super::Status;

    /// Terminal statuses: no transition out except `Kill` from non-Killed states
    pub const TERMINAL: &[Status] = &[Status::Completed, Status::Failed, Status::Killed];

    /// Statuses in which a worker reports itself available for new batches
    pub const AVAILABLE: &[Status] = &[Status::Started, Status::Running];

    /// Statuses in which the engine considers the identity live
    pub const ACTIVE: &[Status] = &[Status::Starting, Status::Started, Status::Running];

    pub fn is_terminal(status: Status) -> bool {
        TERMINAL.contains(&status)
    }

    pub fn is_available(status: Status) -> bool {
        AVAILABLE.contains(&status)
    }
}

/// System-wide operational defaults
pub mod system {
    /// Default bounded capacity of a job's command channel
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

    /// Default number of tasks pulled from a queue per cycle
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    /// Default maximum concurrently executing batches in the worker pool
    pub const DEFAULT_POOL_CONCURRENCY: usize = 8;

    /// Default bound on pool pending-queue length before the manager defers
    pub const DEFAULT_POOL_PENDING_BOUND: usize = 32;

    /// Default exponential backoff sequence in seconds
    pub const DEFAULT_BACKOFF_SECONDS: &[u64] = &[2, 4, 8, 16, 32, 64, 128, 256];

    /// Default event broadcast channel capacity
    pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

    /// Default manager cycle pause when no work is available, in milliseconds
    pub const DEFAULT_CYCLE_PAUSE_MS: u64 = 250;
}
