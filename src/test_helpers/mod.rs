//! Shared test fixtures: an in-memory queue and scriptable workers.
//!
//! Compiled with the crate so unit tests, integration tests, and doc
//! examples can share one set of fixtures.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::jobs::identity::Identity;
use crate::jobs::status::Status;
use crate::workers::queue::{Queue, QueueError, Task};
use crate::workers::worker::{StatusCell, Worker, WorkerContext, WorkResult};

/// In-memory queue that records acknowledgments instead of re-delivering.
pub struct InMemoryQueue {
    name: String,
    tasks: Mutex<VecDeque<Task>>,
    completed: Mutex<Vec<String>>,
    abandoned: Mutex<Vec<String>>,
    sequence: AtomicU64,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Mutex::new(VecDeque::new()),
            completed: Mutex::new(Vec::new()),
            abandoned: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(1),
        }
    }

    pub async fn push(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }

    /// Push a payload with a generated `ref_id`
    pub async fn push_json(&self, payload: serde_json::Value) {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let task = Task::new(format!("{}-{}", self.name, n), self.name.clone(), payload);
        self.tasks.lock().push_back(task);
    }

    pub async fn depth(&self) -> usize {
        self.tasks.lock().len()
    }

    pub async fn completed_count(&self) -> usize {
        self.completed.lock().len()
    }

    pub async fn abandoned_count(&self) -> usize {
        self.abandoned.lock().len()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_batch(&self, size: usize) -> Result<Vec<Task>, QueueError> {
        let mut tasks = self.tasks.lock();
        let take = size.min(tasks.len());
        Ok(tasks.drain(..take).collect())
    }

    async fn complete(&self, task: &Task) -> Result<(), QueueError> {
        self.completed.lock().push(task.ref_id.clone());
        Ok(())
    }

    async fn abandon(&self, task: &Task) -> Result<(), QueueError> {
        self.abandoned.lock().push(task.ref_id.clone());
        Ok(())
    }
}

/// One scripted step of a [`ScriptedWorker`]
#[derive(Debug, Clone)]
pub enum Scripted {
    Next,
    More,
    Done,
    Fail(String),
    Delay(u64),
    Panic,
}

impl Scripted {
    fn into_result(self) -> WorkResult {
        match self {
            Scripted::Next => WorkResult::Next,
            Scripted::More => WorkResult::More,
            Scripted::Done => WorkResult::Done,
            Scripted::Fail(message) => WorkResult::fail(message),
            Scripted::Delay(seconds) => WorkResult::Delay(seconds),
            Scripted::Panic => panic!("scripted panic"),
        }
    }
}

/// Worker whose `work()` results are scripted up front; once the script is
/// exhausted it keeps returning the fallback.
pub struct ScriptedWorker {
    identity: Identity,
    status: StatusCell,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    init_calls: AtomicUsize,
    work_calls: AtomicUsize,
    resume_calls: AtomicUsize,
    done_calls: AtomicUsize,
    fail_calls: AtomicUsize,
    last_error: Mutex<Option<String>>,
    fail_init: bool,
}

impl ScriptedWorker {
    fn build(instance: &str, status: Status, fallback: Scripted, fail_init: bool) -> Arc<Self> {
        Arc::new(Self {
            identity: Identity::worker("area", "svc", "mailer", instance, "test"),
            status: StatusCell::new(status),
            script: Mutex::new(VecDeque::new()),
            fallback,
            init_calls: AtomicUsize::new(0),
            work_calls: AtomicUsize::new(0),
            resume_calls: AtomicUsize::new(0),
            done_calls: AtomicUsize::new(0),
            fail_calls: AtomicUsize::new(0),
            last_error: Mutex::new(None),
            fail_init,
        })
    }

    /// Available worker that returns `Next` for every task
    pub fn available(instance: &str) -> Arc<Self> {
        Self::build(instance, Status::Running, Scripted::Next, false)
    }

    /// Unavailable worker (paused self-report)
    pub fn paused(instance: &str) -> Arc<Self> {
        Self::build(instance, Status::Paused, Scripted::Next, false)
    }

    /// Worker that fails every task
    pub fn failing(instance: &str) -> Arc<Self> {
        Self::build(
            instance,
            Status::Running,
            Scripted::Fail("scripted failure".to_string()),
            false,
        )
    }

    /// Worker whose `init` hook errors
    pub fn with_failing_init(instance: &str) -> Arc<Self> {
        Self::build(instance, Status::Running, Scripted::Next, true)
    }

    /// Worker that plays the given results in order, then the fallback
    pub fn with_script(instance: &str, script: Vec<Scripted>, fallback: Scripted) -> Arc<Self> {
        let worker = Self::build(instance, Status::Running, fallback, false);
        *worker.script.lock() = script.into();
        worker
    }

    pub fn set_status(&self, status: Status) {
        self.status.set(status);
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::Relaxed)
    }

    pub fn worked_count(&self) -> usize {
        self.work_calls.load(Ordering::Relaxed)
    }

    pub fn resumed_count(&self) -> usize {
        self.resume_calls.load(Ordering::Relaxed)
    }

    pub fn done_count(&self) -> usize {
        self.done_calls.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.fail_calls.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn status(&self) -> Status {
        self.status.get()
    }

    async fn init(&self, _context: &WorkerContext) -> anyhow::Result<()> {
        self.init_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_init {
            anyhow::bail!("scripted init failure");
        }
        Ok(())
    }

    async fn work(&self, _task: &Task) -> WorkResult {
        self.work_calls.fetch_add(1, Ordering::Relaxed);
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        step.into_result()
    }

    async fn resume(&self, _reason: &str, _task: Option<&Task>) -> WorkResult {
        self.resume_calls.fetch_add(1, Ordering::Relaxed);
        WorkResult::Next
    }

    async fn done(&self) {
        self.done_calls.fetch_add(1, Ordering::Relaxed);
    }

    async fn fail(&self, error: &anyhow::Error) {
        self.fail_calls.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(error.to_string());
    }
}
