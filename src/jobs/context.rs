//! Per-job aggregate owned exclusively by the job's runner loop.

use std::sync::Arc;

use super::backoff::Backoff;
use super::identity::Identity;
use super::scheduler::Scheduler;
use super::status::Status;
use crate::events::EventNotifier;

/// Everything a job owns: its identity, current status, worker roster,
/// backoff state, scheduler handle, and notifier.
///
/// Owned exclusively by the runner's coordinator loop; no other component
/// mutates these fields. Workers only ever receive the narrowed
/// [`WorkerContext`](crate::workers::worker::WorkerContext).
pub struct JobContext {
    pub identity: Identity,
    pub status: Status,
    pub workers: Vec<Identity>,
    pub backoff: Backoff,
    pub scheduler: Arc<Scheduler>,
    pub notifier: EventNotifier,
}

impl JobContext {
    pub fn new(
        identity: Identity,
        workers: Vec<Identity>,
        backoff: Backoff,
        scheduler: Arc<Scheduler>,
        notifier: EventNotifier,
    ) -> Self {
        Self {
            identity,
            status: Status::default(),
            workers,
            backoff,
            scheduler,
            notifier,
        }
    }
}
