//! Manager loop: weighted queue rotation, batch pull, worker selection, and
//! bounded pool submission.
//!
//! Failure isolation: anything that goes wrong while one worker processes a
//! batch is captured inside that batch's pool task and recorded against that
//! worker only; the manager loop never stops for it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::executor::Outcome;
use super::pool::{PoolError, WorkerPool, WorkerPoolConfig};
use super::queue::{Queue, Task};
use super::registry::{QueueRotation, WorkerEntry, WorkerRegistry};
use super::worker::WorkResult;
use crate::config::ForemanConfig;
use crate::events::{Event, EventNotifier};
use crate::jobs::backoff::Backoff;
use crate::jobs::command::{Action, Command};
use crate::jobs::scheduler::Scheduler;
use crate::jobs::status::Status;

/// Handle for requesting a graceful manager shutdown
#[derive(Clone)]
pub struct ManagerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ManagerHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Pulls priority-weighted batches and assigns them to available workers
/// through a bounded pool.
pub struct Manager {
    config: ForemanConfig,
    registry: Arc<WorkerRegistry>,
    queues: HashMap<String, Arc<dyn Queue>>,
    weights: Vec<(String, u32)>,
    pool: WorkerPool,
    backoff: Backoff,
    scheduler: Arc<Scheduler>,
    notifier: EventNotifier,
    held: VecDeque<(String, Vec<Task>)>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Manager {
    pub fn new(config: ForemanConfig, registry: Arc<WorkerRegistry>, notifier: EventNotifier) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_concurrency: config.pool_concurrency,
            pending_bound: config.pool_pending_bound,
        });
        let backoff = Backoff::new(config.backoff_seconds.clone());

        Self {
            config,
            registry,
            queues: HashMap::new(),
            weights: Vec::new(),
            pool,
            backoff,
            scheduler: Arc::new(Scheduler::new()),
            notifier,
            held: VecDeque::new(),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Add a source queue with a rotation weight
    pub fn add_queue(&mut self, weight: u32, queue: Arc<dyn Queue>) {
        let name = queue.name().to_string();
        self.weights.push((name.clone(), weight));
        self.queues.insert(name, queue);
    }

    pub fn shutdown_handle(&self) -> ManagerHandle {
        ManagerHandle {
            shutdown: Arc::clone(&self.shutdown_tx),
        }
    }

    pub fn pool_stats(&self) -> super::pool::PoolStats {
        self.pool.stats()
    }

    /// Drive the manager until shutdown is requested, then drain in-flight
    /// batches.
    pub async fn run(mut self) {
        let mut rotation = QueueRotation::new(&self.weights);
        info!(
            queues = self.queues.len(),
            pool_concurrency = self.config.pool_concurrency,
            "manager loop starting"
        );

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            // Backpressure: skip pulling entirely while the pool is at its
            // pending bound; silent defer, not an error
            if self.pool.is_saturated() {
                let delay = self.backoff.next();
                debug!(delay_seconds = delay, "pool saturated; deferring");
                tokio::time::sleep(Duration::from_secs(delay)).await;
                continue;
            }

            let (queue_name, batch) = match self.next_work(&mut rotation).await {
                Some(work) => work,
                None => {
                    self.idle_pause().await;
                    continue;
                }
            };

            match self.registry.select(&queue_name).await {
                Some(entry) => {
                    self.backoff.reset();
                    self.dispatch(queue_name, batch, entry);
                }
                None => {
                    // Held, not discarded; retried next cycle
                    debug!(queue = %queue_name, tasks = batch.len(), "no available worker; holding batch");
                    self.held.push_back((queue_name, batch));
                    self.idle_pause().await;
                }
            }
        }

        self.pool.drain().await;
        info!("manager loop stopped");
    }

    /// Next batch to place: a held batch first, otherwise pull from the
    /// rotation's next queue.
    async fn next_work(&mut self, rotation: &mut QueueRotation) -> Option<(String, Vec<Task>)> {
        if let Some(held) = self.held.pop_front() {
            return Some(held);
        }

        let queue_name = rotation.next()?;
        let queue = Arc::clone(self.queues.get(&queue_name)?);

        match queue.next_batch(self.config.batch_size).await {
            Ok(batch) if batch.is_empty() => None,
            Ok(batch) => Some((queue_name, batch)),
            Err(e) => {
                warn!(queue = %queue_name, error = %e, "queue pull failed");
                None
            }
        }
    }

    fn dispatch(&mut self, queue_name: String, batch: Vec<Task>, entry: WorkerEntry) {
        let queue = match self.queues.get(&queue_name) {
            Some(queue) => Arc::clone(queue),
            None => return,
        };

        let notifier = self.notifier.clone();
        let scheduler = Arc::clone(&self.scheduler);
        let tasks = batch.clone();
        let worker = entry.executor.worker().identity().clone();
        let batch_size = batch.len();

        let submitted = self.pool.submit(async move {
            process_batch(entry, queue, tasks, notifier, scheduler).await;
        });

        match submitted {
            Ok(_) => {
                debug!(queue = %queue_name, worker = %worker, tasks = batch_size, "batch submitted");
            }
            Err(PoolError::Saturated { .. }) => {
                // Lost the race against concurrently admitted work
                self.held.push_back((queue_name, batch));
            }
        }
    }

    async fn idle_pause(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.cycle_pause_ms)).await;
    }
}

/// Run one (batch, worker) pair to completion inside the pool.
///
/// Acknowledgment is explicit per task: success completes, failure abandons;
/// a failure stops the batch, abandons its remainder, invokes the worker's
/// `fail` hook, and emits a `Failed` event for that worker only.
async fn process_batch(
    entry: WorkerEntry,
    queue: Arc<dyn Queue>,
    tasks: Vec<Task>,
    notifier: EventNotifier,
    scheduler: Arc<Scheduler>,
) {
    let identity = entry.executor.worker().identity().clone();
    let mut request_more = false;
    let mut stop_at = None;

    for (index, task) in tasks.iter().enumerate() {
        match entry.executor.execute(task).await {
            Outcome::Success(WorkResult::Next) => {
                ack_complete(&queue, task).await;
            }
            Outcome::Success(WorkResult::More) => {
                ack_complete(&queue, task).await;
                request_more = true;
            }
            Outcome::Success(WorkResult::Done) => {
                ack_complete(&queue, task).await;
                entry.executor.worker().done().await;
                notifier.publish(Event::for_identity(
                    &identity,
                    Status::Completed,
                    "work",
                    "worker",
                ));
                stop_at = Some(index + 1);
                break;
            }
            Outcome::Success(WorkResult::Delay(delay_seconds)) => {
                ack_complete(&queue, task).await;
                if let Some(handle) = &entry.coordinator {
                    scheduler.schedule(
                        Duration::from_secs(delay_seconds),
                        Command::worker(
                            Action::Resume,
                            identity.clone(),
                            delay_seconds,
                            "delay requested by work result",
                        ),
                        &identity,
                        handle.clone(),
                    );
                }
                stop_at = Some(index + 1);
                break;
            }
            Outcome::Success(WorkResult::Fail(error)) | Outcome::Failure(error) => {
                if let Err(e) = queue.abandon(task).await {
                    warn!(task = %task.ref_id, error = %e, "abandon failed");
                }
                entry.executor.worker().fail(&error).await;
                notifier.publish(
                    Event::for_identity(&identity, Status::Failed, "work", "worker")
                        .with_field("error", error.to_string()),
                );
                crate::logging::log_error(
                    "manager",
                    "process_batch",
                    &error.to_string(),
                    Some(&identity.to_string()),
                );
                stop_at = Some(index + 1);
                break;
            }
        }
    }

    // Abandon anything we never reached so the transport can re-deliver it
    if let Some(stop) = stop_at {
        for task in &tasks[stop..] {
            if let Err(e) = queue.abandon(task).await {
                warn!(task = %task.ref_id, error = %e, "abandon failed");
            }
        }
    }

    if request_more {
        if let Some(handle) = &entry.coordinator {
            let _ = handle.request(Command::job(Action::Process)).await;
        }
    }
}

async fn ack_complete(queue: &Arc<dyn Queue>, task: &Task) {
    if let Err(e) = queue.complete(task).await {
        warn!(task = %task.ref_id, error = %e, "complete failed");
    }
}
