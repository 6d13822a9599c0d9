//! Command infrastructure for the serialized control channel.
//!
//! Commands are immutable once constructed. Each carries a process-wide
//! monotonic sequence `id` for ordering/audit and a `uuid` correlation id.
//! The [`Command::pairs`] representation is the only wire-ish format this
//! core defines and must remain stable for log tooling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use super::identity::Identity;

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Instruction routed through the coordinator to mutate status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    Pause,
    Resume,
    Process,
    Check,
    Kill,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Process => write!(f, "process"),
            Self::Check => write!(f, "check"),
            Self::Kill => write!(f, "kill"),
        }
    }
}

/// Job-level or worker-level instruction carried through the coordinator.
///
/// # Examples
///
/// ```rust
/// use foreman_core::jobs::command::{Action, Command};
///
/// let cmd = Command::job(Action::Start);
/// let pairs = cmd.pairs();
/// assert_eq!(pairs[0].0, "target");
/// assert_eq!(pairs[3], ("action", "start".to_string()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    /// Instruction aimed at the job itself
    Job {
        id: u64,
        uuid: Uuid,
        action: Action,
    },
    /// Instruction aimed at one of the job's workers, optionally delayed
    Worker {
        id: u64,
        uuid: Uuid,
        action: Action,
        worker: Identity,
        delay_seconds: u64,
        desc: String,
    },
}

impl Command {
    /// Create a job-level command with a fresh sequence id and correlation id
    pub fn job(action: Action) -> Self {
        Self::Job {
            id: next_sequence(),
            uuid: Uuid::new_v4(),
            action,
        }
    }

    /// Create a worker-level command with a fresh sequence id and correlation id
    pub fn worker(
        action: Action,
        worker: Identity,
        delay_seconds: u64,
        desc: impl Into<String>,
    ) -> Self {
        Self::Worker {
            id: next_sequence(),
            uuid: Uuid::new_v4(),
            action,
            worker,
            delay_seconds,
            desc: desc.into(),
        }
    }

    /// Monotonic sequence number, assigned at construction
    pub fn id(&self) -> u64 {
        match self {
            Self::Job { id, .. } | Self::Worker { id, .. } => *id,
        }
    }

    /// Correlation id for request tracking across log lines
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Job { uuid, .. } | Self::Worker { uuid, .. } => *uuid,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Self::Job { action, .. } | Self::Worker { action, .. } => *action,
        }
    }

    /// The worker identity this command targets, if worker-level
    pub fn worker_identity(&self) -> Option<&Identity> {
        match self {
            Self::Job { .. } => None,
            Self::Worker { worker, .. } => Some(worker),
        }
    }

    pub fn target(&self) -> &'static str {
        match self {
            Self::Job { .. } => "job",
            Self::Worker { .. } => "worker",
        }
    }

    /// Stable ordered field pairs for structured log correlation.
    ///
    /// The order `target, id, uuid, action` is a compatibility contract with
    /// log tooling and must not change.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("target", self.target().to_string()),
            ("id", self.id().to_string()),
            ("uuid", self.uuid().to_string()),
            ("action", self.action().to_string()),
        ]
    }
}
