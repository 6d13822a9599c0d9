//! Abstract queue contract. Transport implementations (SQS-like, in-memory)
//! live outside this core; acknowledgment is always explicit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete payload of work pulled from a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Transport-assigned reference used for acknowledgment and audit
    pub ref_id: String,
    /// Originating queue or system
    pub source: String,
    /// Opaque payload
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl Task {
    pub fn new(ref_id: impl Into<String>, source: impl Into<String>, payload: Value) -> Self {
        Self {
            ref_id: ref_id.into(),
            source: source.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("acknowledgment failed for task {ref_id}: {reason}")]
    AckFailed { ref_id: String, reason: String },
}

/// Source of tasks for workers.
///
/// A worker failure must `abandon` the task; success must `complete` it. No
/// implicit visibility-timeout semantics are assumed by this core.
#[async_trait]
pub trait Queue: Send + Sync {
    fn name(&self) -> &str;

    /// Pull up to `size` tasks
    async fn next_batch(&self, size: usize) -> Result<Vec<Task>, QueueError>;

    /// Acknowledge successful processing
    async fn complete(&self, task: &Task) -> Result<(), QueueError>;

    /// Return a task to the queue after a failure
    async fn abandon(&self, task: &Task) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_construction() {
        let task = Task::new("ref-1", "emails", serde_json::json!({"to": "a@b.c"}));
        assert_eq!(task.ref_id, "ref-1");
        assert_eq!(task.source, "emails");
        assert_eq!(task.payload["to"], "a@b.c");
    }
}
