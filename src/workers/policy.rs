//! Composable policies wrapping worker execution.
//!
//! Policies are evaluated in order before the worker runs and observe the
//! outcome afterwards. A transient denial (`Hold`) surfaces as a
//! `WorkResult::Delay` so the job backs off and retries; a permanent denial
//! (`Reject`) fails the unit of work.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::executor::Outcome;
use super::queue::Task;

/// Decision returned by a policy before worker invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Continue down the chain
    Proceed,
    /// Transient denial: delay this many seconds and retry
    Hold(u64),
    /// Permanent denial: fail the unit of work
    Reject(String),
}

/// Cross-cutting middleware applied around worker execution
#[async_trait]
pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluate before the worker runs; `task` is absent for resume calls
    async fn evaluate(&self, task: Option<&Task>) -> PolicyDecision;

    /// Observe the outcome after the worker ran
    fn observe(&self, _outcome: &Outcome) {}
}

/// Token-bucket rate limiter; holds when the interval's budget is spent.
pub struct RateLimitPolicy {
    max_per_interval: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: u32,
    refreshed: Instant,
}

impl RateLimitPolicy {
    pub fn new(max_per_interval: u32, interval: Duration) -> Self {
        Self {
            max_per_interval,
            interval,
            bucket: Mutex::new(Bucket {
                tokens: max_per_interval,
                refreshed: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl Policy for RateLimitPolicy {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn evaluate(&self, _task: Option<&Task>) -> PolicyDecision {
        let mut bucket = self.bucket.lock();

        if bucket.refreshed.elapsed() >= self.interval {
            bucket.tokens = self.max_per_interval;
            bucket.refreshed = Instant::now();
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            PolicyDecision::Proceed
        } else {
            let remaining = self.interval.saturating_sub(bucket.refreshed.elapsed());
            PolicyDecision::Hold(remaining.as_secs().max(1))
        }
    }
}

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - calls are allowed through
    Closed = 0,
    /// Failure mode - calls are held without executing
    Open = 1,
    /// Testing recovery - limited calls allowed
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Circuit breaker with atomic state management; holds while open, closes
/// again after enough half-open successes.
pub struct CircuitBreakerPolicy {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    half_open_successes: AtomicU32,
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreakerPolicy {
    pub fn new(failure_threshold: u32, success_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            failure_threshold,
            success_threshold,
            cooldown,
            opened_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: CircuitState) {
        self.state.store(to as u8, Ordering::Release);
        match to {
            CircuitState::Open => {
                *self.opened_at.lock() = Some(Instant::now());
                warn!(state = "open", "circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                self.half_open_successes.store(0, Ordering::Relaxed);
                info!(state = "half_open", "circuit breaker testing recovery");
            }
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                *self.opened_at.lock() = None;
                info!(state = "closed", "circuit breaker closed");
            }
        }
    }
}

#[async_trait]
impl Policy for CircuitBreakerPolicy {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    async fn evaluate(&self, _task: Option<&Task>) -> PolicyDecision {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => PolicyDecision::Proceed,
            CircuitState::Open => {
                let elapsed = (*self.opened_at.lock()).map(|at| at.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed >= self.cooldown => {
                        self.transition(CircuitState::HalfOpen);
                        PolicyDecision::Proceed
                    }
                    Some(elapsed) => {
                        let remaining = self.cooldown.saturating_sub(elapsed);
                        PolicyDecision::Hold(remaining.as_secs().max(1))
                    }
                    // Open with no timestamp should not happen; allow the call
                    None => PolicyDecision::Proceed,
                }
            }
        }
    }

    fn observe(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Success(_) => match self.state() {
                CircuitState::HalfOpen => {
                    let successes = self.half_open_successes.fetch_add(1, Ordering::Relaxed) + 1;
                    if successes >= self.success_threshold {
                        self.transition(CircuitState::Closed);
                    }
                }
                CircuitState::Closed => {
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                }
                CircuitState::Open => {}
            },
            Outcome::Failure(_) => {
                if self.state() == CircuitState::HalfOpen {
                    self.transition(CircuitState::Open);
                    return;
                }
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.failure_threshold {
                    self.transition(CircuitState::Open);
                }
            }
        }
    }
}

/// Caps how many times a single task reference may be attempted.
pub struct AttemptCapPolicy {
    max_attempts: u32,
    attempts: DashMap<String, u32>,
}

impl AttemptCapPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: DashMap::new(),
        }
    }

    pub fn attempts_for(&self, ref_id: &str) -> u32 {
        self.attempts.get(ref_id).map(|count| *count).unwrap_or(0)
    }
}

#[async_trait]
impl Policy for AttemptCapPolicy {
    fn name(&self) -> &'static str {
        "attempt_cap"
    }

    async fn evaluate(&self, task: Option<&Task>) -> PolicyDecision {
        let Some(task) = task else {
            return PolicyDecision::Proceed;
        };

        let mut count = self.attempts.entry(task.ref_id.clone()).or_insert(0);
        *count += 1;
        if *count > self.max_attempts {
            PolicyDecision::Reject(format!(
                "attempt cap {} exceeded for task {}",
                self.max_attempts, task.ref_id
            ))
        } else {
            PolicyDecision::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::worker::WorkResult;

    fn test_task(ref_id: &str) -> Task {
        Task::new(ref_id, "emails", serde_json::json!({}))
    }

    #[tokio::test]
    async fn test_rate_limit_holds_when_budget_spent() {
        let policy = RateLimitPolicy::new(2, Duration::from_secs(60));
        let task = test_task("t-1");

        assert_eq!(policy.evaluate(Some(&task)).await, PolicyDecision::Proceed);
        assert_eq!(policy.evaluate(Some(&task)).await, PolicyDecision::Proceed);
        match policy.evaluate(Some(&task)).await {
            PolicyDecision::Hold(seconds) => assert!(seconds >= 1),
            other => panic!("expected hold, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold_failures() {
        let policy = CircuitBreakerPolicy::new(2, 1, Duration::from_secs(30));
        assert_eq!(policy.state(), CircuitState::Closed);

        policy.observe(&Outcome::Failure(anyhow::anyhow!("boom")));
        assert_eq!(policy.state(), CircuitState::Closed);
        policy.observe(&Outcome::Failure(anyhow::anyhow!("boom")));
        assert_eq!(policy.state(), CircuitState::Open);

        match policy.evaluate(None).await {
            PolicyDecision::Hold(seconds) => assert!(seconds >= 1),
            other => panic!("expected hold while open, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_circuit_recovers_through_half_open() {
        let policy = CircuitBreakerPolicy::new(1, 2, Duration::from_secs(0));
        policy.observe(&Outcome::Failure(anyhow::anyhow!("boom")));
        assert_eq!(policy.state(), CircuitState::Open);

        // Zero cooldown: the next evaluate transitions to half-open
        assert_eq!(policy.evaluate(None).await, PolicyDecision::Proceed);
        assert_eq!(policy.state(), CircuitState::HalfOpen);

        policy.observe(&Outcome::Success(WorkResult::Next));
        assert_eq!(policy.state(), CircuitState::HalfOpen);
        policy.observe(&Outcome::Success(WorkResult::Next));
        assert_eq!(policy.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_circuit_reopens_on_half_open_failure() {
        let policy = CircuitBreakerPolicy::new(1, 2, Duration::from_secs(0));
        policy.observe(&Outcome::Failure(anyhow::anyhow!("boom")));
        policy.evaluate(None).await;
        assert_eq!(policy.state(), CircuitState::HalfOpen);

        policy.observe(&Outcome::Failure(anyhow::anyhow!("boom")));
        assert_eq!(policy.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_attempt_cap_rejects_past_limit() {
        let policy = AttemptCapPolicy::new(2);
        let task = test_task("t-9");

        assert_eq!(policy.evaluate(Some(&task)).await, PolicyDecision::Proceed);
        assert_eq!(policy.evaluate(Some(&task)).await, PolicyDecision::Proceed);
        match policy.evaluate(Some(&task)).await {
            PolicyDecision::Reject(reason) => assert!(reason.contains("t-9")),
            other => panic!("expected reject, got {other:?}"),
        }
        assert_eq!(policy.attempts_for("t-9"), 3);

        // Resume calls carry no task and always proceed
        assert_eq!(policy.evaluate(None).await, PolicyDecision::Proceed);
    }
}
