//! Execution boundary composing a worker's `work()` call with a chain of
//! cross-cutting policies.
//!
//! Every failure mode of worker code, returned errors and panics alike, is
//! captured here and converted to an [`Outcome`]; nothing propagates past
//! this boundary.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::policy::{Policy, PolicyDecision};
use super::queue::Task;
use super::worker::{Worker, WorkResult};

/// Result of one executor invocation
#[derive(Debug)]
pub enum Outcome {
    /// Worker returned a non-failing [`WorkResult`]
    Success(WorkResult),
    /// Worker returned `Fail`, errored, or panicked
    Failure(anyhow::Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Execution counters; the only engine state designed for concurrent
/// increment, hence atomics.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    pub executed: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub held: AtomicU64,
}

impl ExecutorStats {
    pub fn snapshot(&self) -> ExecutorStatsSnapshot {
        ExecutorStatsSnapshot {
            executed: self.executed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            held: self.held.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`ExecutorStats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorStatsSnapshot {
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub held: u64,
}

/// Composes a worker with an ordered policy chain and records outcomes.
///
/// With no policies configured, `execute` records the call directly; with
/// policies it threads the task through the chain first. `direct` bypasses
/// both policies and counters and exists for diagnostics only.
pub struct WorkExecutor {
    worker: Arc<dyn Worker>,
    policies: Vec<Arc<dyn Policy>>,
    stats: Arc<ExecutorStats>,
}

impl WorkExecutor {
    pub fn new(worker: Arc<dyn Worker>) -> Self {
        Self {
            worker,
            policies: Vec::new(),
            stats: Arc::new(ExecutorStats::default()),
        }
    }

    pub fn with_policies(worker: Arc<dyn Worker>, policies: Vec<Arc<dyn Policy>>) -> Self {
        Self {
            worker,
            policies,
            stats: Arc::new(ExecutorStats::default()),
        }
    }

    pub fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }

    pub fn stats(&self) -> Arc<ExecutorStats> {
        Arc::clone(&self.stats)
    }

    /// Execute one unit of work under the configured policies
    pub async fn execute(&self, task: &Task) -> Outcome {
        if self.policies.is_empty() {
            self.record(task).await
        } else {
            self.impose(task).await
        }
    }

    /// Bypass policies and counters entirely. Diagnostics/testing only.
    pub async fn direct(&self, task: &Task) -> Outcome {
        Self::invoke(self.worker.work(task)).await
    }

    /// Invoke the worker's resume hook under the same policy composition
    pub async fn resume(&self, reason: &str, task: Option<&Task>) -> Outcome {
        for policy in &self.policies {
            match policy.evaluate(task).await {
                PolicyDecision::Proceed => {}
                PolicyDecision::Hold(delay_seconds) => {
                    self.stats.held.fetch_add(1, Ordering::Relaxed);
                    debug!(policy = policy.name(), delay_seconds, "resume held by policy");
                    return Outcome::Success(WorkResult::Delay(delay_seconds));
                }
                PolicyDecision::Reject(reason) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    return Outcome::Failure(anyhow::anyhow!(reason));
                }
            }
        }

        self.stats.executed.fetch_add(1, Ordering::Relaxed);
        let outcome = Self::invoke(self.worker.resume(reason, task)).await;
        self.count(&outcome);
        for policy in &self.policies {
            policy.observe(&outcome);
        }
        outcome
    }

    /// Lifecycle + counters without a policy chain
    async fn record(&self, task: &Task) -> Outcome {
        self.stats.executed.fetch_add(1, Ordering::Relaxed);
        let outcome = Self::invoke(self.worker.work(task)).await;
        self.count(&outcome);
        outcome
    }

    /// Thread the task through the policy chain, then record
    async fn impose(&self, task: &Task) -> Outcome {
        for policy in &self.policies {
            match policy.evaluate(Some(task)).await {
                PolicyDecision::Proceed => {}
                PolicyDecision::Hold(delay_seconds) => {
                    self.stats.held.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        policy = policy.name(),
                        task = %task.ref_id,
                        delay_seconds,
                        "task held by policy"
                    );
                    return Outcome::Success(WorkResult::Delay(delay_seconds));
                }
                PolicyDecision::Reject(reason) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(policy = policy.name(), task = %task.ref_id, %reason, "task rejected by policy");
                    return Outcome::Failure(anyhow::anyhow!(reason));
                }
            }
        }

        let outcome = self.record(task).await;
        for policy in &self.policies {
            policy.observe(&outcome);
        }
        outcome
    }

    /// Run a worker future, converting returned failures and panics into
    /// [`Outcome::Failure`]
    async fn invoke<F>(future: F) -> Outcome
    where
        F: std::future::Future<Output = WorkResult>,
    {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(WorkResult::Fail(error)) => Outcome::Failure(error),
            Ok(result) => Outcome::Success(result),
            Err(panic) => Outcome::Failure(anyhow::anyhow!(
                "worker panicked: {}",
                panic_message(panic)
            )),
        }
    }

    fn count(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Success(_) => self.stats.succeeded.fetch_add(1, Ordering::Relaxed),
            Outcome::Failure(_) => self.stats.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
