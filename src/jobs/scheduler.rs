//! Timer facility that re-injects a command into a coordinator after a delay.
//!
//! Scheduling is fire-and-forget: the timer task sleeps and then requests the
//! command through the target's [`CoordinatorHandle`]. Timers are tracked per
//! target identity so a `Kill`/`Stop` can abort anything still pending; a
//! timer that fires anyway is rejected by rules validation and is a no-op.

use dashmap::DashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::command::Command;
use super::coordinator::CoordinatorHandle;
use super::identity::Identity;

/// Delayed command delivery keyed by target identity
#[derive(Default)]
pub struct Scheduler {
    pending: DashMap<Identity, Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Arrange for `command` to be delivered through `handle` after `delay`.
    ///
    /// Delivery failures (channel closed) are logged and dropped; the target
    /// is already gone.
    pub fn schedule(
        &self,
        delay: Duration,
        command: Command,
        target: &Identity,
        handle: CoordinatorHandle,
    ) {
        debug!(
            target_identity = %target,
            delay_seconds = delay.as_secs(),
            command_id = command.id(),
            action = %command.action(),
            "scheduling delayed command"
        );

        let identity = target.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = handle.request(command).await {
                warn!(target_identity = %identity, error = %e, "scheduled command undeliverable");
            }
        });

        let mut entry = self.pending.entry(target.clone()).or_default();
        entry.retain(|handle| !handle.is_finished());
        entry.push(task);
    }

    /// Abort every pending timer for the target, returning how many were live
    pub fn cancel(&self, target: &Identity) -> usize {
        match self.pending.remove(target) {
            Some((_, handles)) => {
                let live = handles.iter().filter(|h| !h.is_finished()).count();
                for handle in handles {
                    handle.abort();
                }
                debug!(target_identity = %target, cancelled = live, "cancelled scheduled commands");
                live
            }
            None => 0,
        }
    }

    /// Number of timers still tracked for the target (including fired ones
    /// not yet pruned)
    pub fn pending_count(&self, target: &Identity) -> usize {
        self.pending
            .get(target)
            .map(|handles| handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::command::Action;
    use crate::jobs::coordinator::Coordinator;

    #[tokio::test(start_paused = true)]
    async fn test_command_delivered_after_delay() {
        let coordinator = Coordinator::new(8);
        let scheduler = Scheduler::new();
        let target = Identity::job("a", "s", "j", "0", "test");

        let cmd = Command::job(Action::Resume);
        let expected = cmd.id();
        scheduler.schedule(
            Duration::from_secs(30),
            cmd,
            &target,
            coordinator.handle(),
        );

        // Let the timer task register its sleep before advancing the clock
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(31)).await;

        use crate::jobs::coordinator::{Flow, Respond};
        use async_trait::async_trait;

        struct TakeOne(Option<u64>);

        #[async_trait]
        impl Respond for TakeOne {
            async fn on_command(&mut self, command: Command) -> Flow {
                self.0 = Some(command.id());
                Flow::Shutdown
            }
        }

        let mut take = TakeOne(None);
        coordinator.respond(&mut take).await.unwrap();
        assert_eq!(take.0, Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_timers() {
        let coordinator = Coordinator::new(8);
        let scheduler = Scheduler::new();
        let target = Identity::job("a", "s", "j", "0", "test");

        scheduler.schedule(
            Duration::from_secs(60),
            Command::job(Action::Resume),
            &target,
            coordinator.handle(),
        );
        assert_eq!(scheduler.pending_count(&target), 1);

        let cancelled = scheduler.cancel(&target);
        assert_eq!(cancelled, 1);
        assert_eq!(scheduler.pending_count(&target), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_target_is_noop() {
        let scheduler = Scheduler::new();
        let target = Identity::job("a", "s", "j", "9", "test");
        assert_eq!(scheduler.cancel(&target), 0);
    }
}
