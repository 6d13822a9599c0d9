//! Worker registration and selection.
//!
//! Workers register per queue name; selection among available workers is
//! uniformly random to spread load. Queue selection across priorities is a
//! weighted round-robin rotation.

use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::executor::WorkExecutor;
use crate::constants::status_groups;
use crate::jobs::coordinator::CoordinatorHandle;

/// A registered worker: its executor plus, when the worker belongs to a
/// runner-driven job, the job's coordinator handle for follow-up commands.
#[derive(Clone)]
pub struct WorkerEntry {
    pub executor: Arc<WorkExecutor>,
    pub coordinator: Option<CoordinatorHandle>,
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no workers registered for queue {queue}")]
    UnknownQueue { queue: String },
}

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub queues: usize,
    pub total_workers: usize,
    pub available_workers: usize,
}

/// Queue-name keyed worker registry
#[derive(Default)]
pub struct WorkerRegistry {
    entries: RwLock<HashMap<String, Vec<WorkerEntry>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a worker for a queue
    pub async fn register(
        &self,
        queue: impl Into<String>,
        executor: Arc<WorkExecutor>,
        coordinator: Option<CoordinatorHandle>,
    ) {
        let queue = queue.into();
        let identity = executor.worker().identity().clone();
        let mut entries = self.entries.write().await;
        entries.entry(queue.clone()).or_default().push(WorkerEntry {
            executor,
            coordinator,
        });
        info!(queue = %queue, worker = %identity, "worker registered");
    }

    /// Remove every registration for a worker identity, returning how many
    /// entries were dropped
    pub async fn unregister(&self, identity: &crate::jobs::identity::Identity) -> usize {
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for workers in entries.values_mut() {
            let before = workers.len();
            workers.retain(|entry| entry.executor.worker().identity() != identity);
            removed += before - workers.len();
        }
        entries.retain(|_, workers| !workers.is_empty());
        if removed > 0 {
            info!(worker = %identity, removed, "worker unregistered");
        }
        removed
    }

    /// Workers registered for a queue that currently report themselves
    /// available (`Started` or `Running`)
    pub async fn available_for(&self, queue: &str) -> Vec<WorkerEntry> {
        let entries = self.entries.read().await;
        entries
            .get(queue)
            .map(|workers| {
                workers
                    .iter()
                    .filter(|entry| {
                        status_groups::is_available(entry.executor.worker().status())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Select one available worker for a queue, uniformly at random among
    /// the available set; `None` when every registered worker is busy or
    /// the queue is unknown.
    pub async fn select(&self, queue: &str) -> Option<WorkerEntry> {
        let available = self.available_for(queue).await;
        if available.is_empty() {
            debug!(queue = %queue, "no available workers");
            return None;
        }
        available.choose(&mut rand::thread_rng()).cloned()
    }

    /// Whether any worker (available or not) is registered for the queue
    pub async fn has_workers(&self, queue: &str) -> bool {
        self.entries
            .read()
            .await
            .get(queue)
            .is_some_and(|workers| !workers.is_empty())
    }

    pub async fn stats(&self) -> RegistryStats {
        let entries = self.entries.read().await;
        let total_workers = entries.values().map(Vec::len).sum();
        let available_workers = entries
            .values()
            .flatten()
            .filter(|entry| status_groups::is_available(entry.executor.worker().status()))
            .count();
        RegistryStats {
            queues: entries.len(),
            total_workers,
            available_workers,
        }
    }
}

/// Weighted round-robin rotation over configured queue priorities.
///
/// A queue with weight 3 appears three times per rotation cycle; zero-weight
/// queues are excluded.
#[derive(Debug, Clone)]
pub struct QueueRotation {
    slots: Vec<String>,
    cursor: usize,
}

impl QueueRotation {
    pub fn new(weights: &[(String, u32)]) -> Self {
        let mut slots = Vec::new();
        for (queue, weight) in weights {
            for _ in 0..*weight {
                slots.push(queue.clone());
            }
        }
        Self { slots, cursor: 0 }
    }

    /// Next queue in rotation; `None` when no queue has positive weight
    pub fn next(&mut self) -> Option<String> {
        if self.slots.is_empty() {
            return None;
        }
        let queue = self.slots[self.cursor % self.slots.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Some(queue)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::identity::Identity;
    use crate::jobs::status::Status;
    use crate::workers::queue::Task;
    use crate::workers::worker::{StatusCell, Worker, WorkResult};
    use async_trait::async_trait;

    struct IdleWorker {
        identity: Identity,
        status: StatusCell,
    }

    impl IdleWorker {
        fn new(instance: &str, status: Status) -> Arc<Self> {
            Arc::new(Self {
                identity: Identity::worker("area", "svc", "mailer", instance, "test"),
                status: StatusCell::new(status),
            })
        }
    }

    #[async_trait]
    impl Worker for IdleWorker {
        fn identity(&self) -> &Identity {
            &self.identity
        }

        fn status(&self) -> Status {
            self.status.get()
        }

        async fn work(&self, _task: &Task) -> WorkResult {
            WorkResult::Next
        }
    }

    async fn registry_with(statuses: &[(&str, Status)]) -> WorkerRegistry {
        let registry = WorkerRegistry::new();
        for (instance, status) in statuses {
            let worker = IdleWorker::new(instance, *status);
            registry
                .register("emails", Arc::new(WorkExecutor::new(worker)), None)
                .await;
        }
        registry
    }

    #[tokio::test]
    async fn test_only_available_workers_are_selectable() {
        let registry = registry_with(&[
            ("0", Status::Running),
            ("1", Status::Paused),
            ("2", Status::Failed),
        ])
        .await;

        let available = registry.available_for("emails").await;
        assert_eq!(available.len(), 1);
        assert_eq!(
            available[0].executor.worker().identity().instance,
            "0".to_string()
        );
    }

    #[tokio::test]
    async fn test_selection_returns_none_when_all_busy() {
        let registry = registry_with(&[("0", Status::Paused)]).await;
        assert!(registry.select("emails").await.is_none());
        assert!(registry.has_workers("emails").await);
    }

    #[tokio::test]
    async fn test_selection_distribution_is_non_degenerate() {
        let registry = registry_with(&[("0", Status::Running), ("1", Status::Started)]).await;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..100 {
            let entry = registry.select("emails").await.unwrap();
            let instance = entry.executor.worker().identity().instance.clone();
            *counts.entry(instance).or_insert(0) += 1;
        }

        // Neither worker starves under uniform random selection
        assert!(counts.get("0").copied().unwrap_or(0) > 0);
        assert!(counts.get("1").copied().unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn test_unregister_removes_all_entries() {
        let registry = registry_with(&[("0", Status::Running)]).await;
        let identity = Identity::worker("area", "svc", "mailer", "0", "test");
        assert_eq!(registry.unregister(&identity).await, 1);
        assert!(!registry.has_workers("emails").await);
    }

    #[test]
    fn test_weighted_rotation() {
        let mut rotation = QueueRotation::new(&[
            ("high".to_string(), 2),
            ("low".to_string(), 1),
            ("off".to_string(), 0),
        ]);

        let cycle: Vec<String> = (0..6).filter_map(|_| rotation.next()).collect();
        assert_eq!(cycle, vec!["high", "high", "low", "high", "high", "low"]);
    }

    #[test]
    fn test_empty_rotation_yields_none() {
        let mut rotation = QueueRotation::new(&[]);
        assert!(rotation.next().is_none());
        assert!(rotation.is_empty());
    }
}
