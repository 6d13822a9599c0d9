//! Lifecycle driver: reacts to commands from the coordinator, performs
//! rules-gated status transitions around the worker's `init → work →
//! done/fail` hooks, and schedules delayed resumption.
//!
//! The runner is the single consumer of its job's coordinator, so every
//! status mutation here is serialized without locks.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::command::{Action, Command};
use super::context::JobContext;
use super::coordinator::{Coordinator, CoordinatorHandle, Flow, Respond};
use super::identity::Identity;
use super::scheduler::Scheduler;
use super::status::{rules, Status};
use crate::error::{ForemanError, Result};
use crate::events::{Event, EventNotifier};
use crate::logging::log_command_operation;
use crate::workers::executor::{Outcome, WorkExecutor};
use crate::workers::queue::{Queue, Task};
use crate::workers::worker::{WorkResult, WorkerContext};

/// Drives one job's lifecycle from its coordinator loop.
pub struct JobRunner {
    context: JobContext,
    executor: Arc<WorkExecutor>,
    queue: Arc<dyn Queue>,
    handle: CoordinatorHandle,
}

impl JobRunner {
    pub fn new(
        identity: Identity,
        coordinator: &Coordinator,
        executor: Arc<WorkExecutor>,
        queue: Arc<dyn Queue>,
        scheduler: Arc<Scheduler>,
        notifier: EventNotifier,
    ) -> Self {
        let workers = vec![executor.worker().identity().clone()];
        let context = JobContext::new(
            identity,
            workers,
            super::backoff::Backoff::default(),
            scheduler,
            notifier,
        );
        Self {
            context,
            executor,
            queue,
            handle: coordinator.handle(),
        }
    }

    /// Replace the default backoff sequence
    pub fn with_backoff(mut self, backoff: super::backoff::Backoff) -> Self {
        self.context.backoff = backoff;
        self
    }

    pub fn status(&self) -> Status {
        self.context.status
    }

    pub fn identity(&self) -> &Identity {
        &self.context.identity
    }

    /// Drain the coordinator until a `Kill` is processed, then return the
    /// runner for inspection.
    pub async fn run(mut self, coordinator: Arc<Coordinator>) -> Result<JobRunner> {
        coordinator.respond(&mut self).await?;
        Ok(self)
    }

    /// Rules-gated handling of one command. An invalid transition is
    /// surfaced as an error; the status is left unchanged and no event is
    /// emitted.
    async fn handle_command(&mut self, command: &Command) -> Result<Flow> {
        rules::check(command.action(), self.context.status)?;

        match command.action() {
            Action::Start => self.on_start().await?,
            Action::Process => self.on_process().await?,
            Action::Pause => self.transition(Status::Paused, "pause"),
            Action::Resume => self.on_resume(command).await?,
            Action::Stop => {
                self.transition(Status::Stopped, "stop");
                self.context.scheduler.cancel(&self.context.identity);
            }
            Action::Kill => {
                self.transition(Status::Killed, "kill");
                self.context.scheduler.cancel(&self.context.identity);
                return Ok(Flow::Shutdown);
            }
            Action::Check => self.on_check(),
        }

        Ok(Flow::Continue)
    }

    async fn on_start(&mut self) -> Result<()> {
        self.transition(Status::Starting, "start");
        self.context.backoff.reset();

        let worker_context = WorkerContext {
            identity: self.executor.worker().identity().clone(),
            stats: self.executor.stats(),
        };

        match self.executor.worker().init(&worker_context).await {
            Ok(()) => {
                self.transition(Status::Started, "start");
                self.handle.request(Command::job(Action::Process)).await?;
            }
            Err(error) => {
                self.fail_job(&error, "init").await;
            }
        }
        Ok(())
    }

    async fn on_process(&mut self) -> Result<()> {
        if self.context.status == Status::Started {
            self.transition(Status::Running, "process");
        }

        let mut batch = match self.queue.next_batch(1).await {
            Ok(batch) => batch,
            Err(error) => {
                warn!(job = %self.context.identity, %error, "queue pull failed");
                self.schedule_process("queue unavailable");
                return Ok(());
            }
        };

        let Some(task) = batch.pop() else {
            // Idle is not an error: back off and try again later
            self.schedule_process("queue idle");
            return Ok(());
        };

        match self.executor.execute(&task).await {
            Outcome::Success(WorkResult::Next) | Outcome::Success(WorkResult::More) => {
                self.ack_complete(&task).await;
                self.context.backoff.reset();
                self.handle.request(Command::job(Action::Process)).await?;
            }
            Outcome::Success(WorkResult::Done) => {
                self.ack_complete(&task).await;
                self.executor.worker().done().await;
                self.transition(Status::Completed, "work");
            }
            Outcome::Success(WorkResult::Delay(delay_seconds)) => {
                self.ack_complete(&task).await;
                self.transition(Status::Paused, "delay");
                self.schedule_resume(delay_seconds);
            }
            Outcome::Success(WorkResult::Fail(error)) | Outcome::Failure(error) => {
                if let Err(e) = self.queue.abandon(&task).await {
                    warn!(task = %task.ref_id, error = %e, "abandon failed");
                }
                self.fail_job(&error, "work").await;
            }
        }
        Ok(())
    }

    async fn on_resume(&mut self, command: &Command) -> Result<()> {
        let reason = match command {
            Command::Worker { desc, .. } => desc.as_str(),
            Command::Job { .. } => "resume requested",
        };

        match self.executor.resume(reason, None).await {
            Outcome::Success(WorkResult::Delay(delay_seconds)) => {
                // Still held back (e.g. by a policy); stay paused and retry
                self.schedule_resume(delay_seconds);
            }
            Outcome::Success(_) => {
                self.transition(Status::Running, "resume");
                self.context.backoff.reset();
                self.handle.request(Command::job(Action::Process)).await?;
            }
            Outcome::Failure(error) => {
                self.fail_job(&error, "resume").await;
            }
        }
        Ok(())
    }

    fn on_check(&self) {
        let snapshot = self.executor.stats().snapshot();
        info!(
            job = %self.context.identity,
            status = %self.context.status,
            executed = snapshot.executed,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            "job check"
        );
        self.context.notifier.publish(
            Event::for_identity(&self.context.identity, self.context.status, "check", "job")
                .with_field("executed", snapshot.executed.to_string()),
        );
    }

    /// Apply a transition and emit its event. Callers have already passed
    /// rules validation.
    fn transition(&mut self, to: Status, source: &str) {
        let from = self.context.status;
        self.context.status = to;
        debug!(job = %self.context.identity, %from, %to, source, "status transition");
        self.context.notifier.publish(Event::for_identity(
            &self.context.identity,
            to,
            source,
            "job",
        ));
    }

    async fn fail_job(&mut self, error: &anyhow::Error, source: &str) {
        self.executor.worker().fail(error).await;
        let from = self.context.status;
        self.context.status = Status::Failed;
        warn!(job = %self.context.identity, %from, %error, source, "job failed");
        self.context.notifier.publish(
            Event::for_identity(&self.context.identity, Status::Failed, source, "job")
                .with_field("error", error.to_string()),
        );
    }

    fn schedule_process(&mut self, why: &str) {
        let delay = self.context.backoff.next();
        debug!(job = %self.context.identity, delay_seconds = delay, why, "scheduling process retry");
        self.context.scheduler.schedule(
            Duration::from_secs(delay),
            Command::job(Action::Process),
            &self.context.identity,
            self.handle.clone(),
        );
    }

    fn schedule_resume(&self, delay_seconds: u64) {
        let worker = self.executor.worker().identity().clone();
        self.context.scheduler.schedule(
            Duration::from_secs(delay_seconds),
            Command::worker(
                Action::Resume,
                worker,
                delay_seconds,
                "delay requested by work result",
            ),
            &self.context.identity,
            self.handle.clone(),
        );
    }

    async fn ack_complete(&self, task: &Task) {
        if let Err(e) = self.queue.complete(task).await {
            warn!(task = %task.ref_id, error = %e, "complete failed");
        }
    }
}

#[async_trait]
impl Respond for JobRunner {
    async fn on_command(&mut self, command: Command) -> Flow {
        log_command_operation("handle", &command.pairs());
        match self.handle_command(&command).await {
            Ok(flow) => flow,
            Err(ForemanError::TransitionError(message)) => {
                warn!(job = %self.context.identity, %message, "command rejected");
                Flow::Continue
            }
            Err(error) => {
                warn!(job = %self.context.identity, %error, "command handling failed");
                Flow::Continue
            }
        }
    }
}
