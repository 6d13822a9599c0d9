use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::jobs::identity::Identity;
use crate::jobs::status::Status;

/// Immutable snapshot emitted on every status change.
///
/// Events flow outward to subscribers only; they are never fed back into
/// engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub uuid: Uuid,
    pub area: String,
    pub service: String,
    pub name: String,
    pub status: Status,
    pub source: String,
    pub target: String,
    pub time: DateTime<Utc>,
    pub fields: Vec<(String, String)>,
}

impl Event {
    /// Snapshot the given identity at a status
    pub fn for_identity(
        identity: &Identity,
        status: Status,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            area: identity.area.clone(),
            service: identity.service.clone(),
            name: identity.name.clone(),
            status,
            source: source.into(),
            target: target.into(),
            time: Utc::now(),
            fields: Vec::new(),
        }
    }

    /// Attach an extra field pair to the snapshot
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Notifier statistics
#[derive(Debug, Clone)]
pub struct NotifierStats {
    pub global_subscribers: usize,
    pub status_topics: usize,
    pub events_published: u64,
}

/// Best-effort pub/sub fan-out of status-change events.
///
/// Publishes on a global broadcast channel and, topic-style, on a per-status
/// channel. Broadcast sends never block the publishing loop; a slow
/// subscriber lags and drops rather than stalling the coordinator.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    global: broadcast::Sender<Event>,
    by_status: std::sync::Arc<DashMap<Status, broadcast::Sender<Event>>>,
    published: std::sync::Arc<std::sync::atomic::AtomicU64>,
    capacity: usize,
}

impl EventNotifier {
    /// Create a notifier with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (global, _) = broadcast::channel(capacity);
        Self {
            global,
            by_status: std::sync::Arc::new(DashMap::new()),
            published: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)),
            capacity,
        }
    }

    /// Publish an event to global and per-status subscribers.
    ///
    /// A send with no subscribers is not an error; events are published even
    /// when no one is listening.
    pub fn publish(&self, event: Event) {
        self.published
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        if let Some(topic) = self.by_status.get(&event.status) {
            let _ = topic.send(event.clone());
        }
        let _ = self.global.send(event);
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.global.subscribe()
    }

    /// Subscribe to events for one status only (topic-style)
    pub fn subscribe_status(&self, status: Status) -> broadcast::Receiver<Event> {
        self.by_status
            .entry(status)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Get the number of active global subscribers
    pub fn subscriber_count(&self) -> usize {
        self.global.receiver_count()
    }

    pub fn stats(&self) -> NotifierStats {
        NotifierStats {
            global_subscribers: self.global.receiver_count(),
            status_topics: self.by_status.len(),
            events_published: self.published.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> Identity {
        Identity::job("area", "svc", "job", "0", "test")
    }

    #[tokio::test]
    async fn test_publish_reaches_global_subscriber() {
        let notifier = EventNotifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.publish(Event::for_identity(
            &test_identity(),
            Status::Running,
            "start",
            "job",
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status, Status::Running);
        assert_eq!(event.name, "job");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let notifier = EventNotifier::new(16);
        notifier.publish(Event::for_identity(
            &test_identity(),
            Status::Completed,
            "done",
            "job",
        ));
        assert_eq!(notifier.stats().events_published, 1);
    }

    #[tokio::test]
    async fn test_status_topic_receives_only_matching_status() {
        let notifier = EventNotifier::new(16);
        let mut failed_rx = notifier.subscribe_status(Status::Failed);

        notifier.publish(Event::for_identity(
            &test_identity(),
            Status::Running,
            "start",
            "job",
        ));
        notifier.publish(
            Event::for_identity(&test_identity(), Status::Failed, "work", "job")
                .with_field("error", "boom"),
        );

        let event = failed_rx.recv().await.unwrap();
        assert_eq!(event.status, Status::Failed);
        assert_eq!(event.fields, vec![("error".to_string(), "boom".to_string())]);
        assert!(failed_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let notifier = EventNotifier::new(2);
        let mut rx = notifier.subscribe();

        for _ in 0..10 {
            notifier.publish(Event::for_identity(
                &test_identity(),
                Status::Running,
                "tick",
                "job",
            ));
        }

        // The subscriber lost the overflow but the publisher never stalled
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => assert!(skipped > 0),
            Ok(_) => {}
            Err(e) => panic!("unexpected receive error: {e}"),
        }
    }
}
