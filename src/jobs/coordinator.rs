//! Single-consumer command channel serializing all status mutation for one
//! job and its workers.
//!
//! Producers enqueue through [`Coordinator::request`] or a cloned
//! [`CoordinatorHandle`]; exactly one [`Coordinator::respond`] loop drains
//! commands strictly in arrival order. Send discipline is bounded-blocking:
//! a full channel suspends the producer, which is the backpressure signal.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::command::Command;

/// Whether the consumer loop should keep draining after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Consumer side of the coordinator; implemented by the job runner
#[async_trait]
pub trait Respond {
    async fn on_command(&mut self, command: Command) -> Flow;
}

/// Coordinator errors
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("command channel is closed")]
    ChannelClosed,

    #[error("a respond loop is already draining this coordinator")]
    ConsumerActive,
}

/// Serialized command channel for one [`Identity`](super::identity::Identity).
///
/// # Examples
///
/// ```rust
/// use foreman_core::jobs::command::{Action, Command};
/// use foreman_core::jobs::coordinator::{Coordinator, Flow, Respond};
/// use async_trait::async_trait;
///
/// struct Collect(Vec<u64>);
///
/// #[async_trait]
/// impl Respond for Collect {
///     async fn on_command(&mut self, command: Command) -> Flow {
///         self.0.push(command.id());
///         Flow::Shutdown
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let coordinator = Coordinator::new(8);
/// coordinator.request(Command::job(Action::Start)).await.unwrap();
/// let mut collect = Collect(Vec::new());
/// coordinator.respond(&mut collect).await.unwrap();
/// assert_eq!(collect.0.len(), 1);
/// # });
/// ```
pub struct Coordinator {
    tx: mpsc::Sender<Command>,
    rx: Mutex<Option<mpsc::Receiver<Command>>>,
}

impl Coordinator {
    /// Create a coordinator with a bounded channel of the given capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Cloneable producer handle for schedulers and external callers
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue a command, suspending when the channel is full
    pub async fn request(&self, command: Command) -> Result<(), CoordinatorError> {
        debug!(id = command.id(), action = %command.action(), "coordinator request");
        self.tx
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Drain commands in strict arrival order, invoking the responder one
    /// command at a time until it returns [`Flow::Shutdown`] or every sender
    /// is dropped.
    ///
    /// Only one respond loop may run at a time; a concurrent call fails with
    /// [`CoordinatorError::ConsumerActive`]. The responder may enqueue
    /// follow-up commands through a [`CoordinatorHandle`]; enqueue is
    /// decoupled from the in-flight dequeue.
    pub async fn respond<R>(&self, responder: &mut R) -> Result<(), CoordinatorError>
    where
        R: Respond + Send,
    {
        let mut rx = self
            .rx
            .lock()
            .take()
            .ok_or(CoordinatorError::ConsumerActive)?;

        while let Some(command) = rx.recv().await {
            if responder.on_command(command).await == Flow::Shutdown {
                break;
            }
        }

        *self.rx.lock() = Some(rx);
        Ok(())
    }
}

/// Cloneable producer side of a [`Coordinator`]
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Enqueue a command, suspending when the channel is full
    pub async fn request(&self, command: Command) -> Result<(), CoordinatorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::command::Action;

    struct Recorder {
        seen: Vec<u64>,
        remaining: usize,
    }

    #[async_trait]
    impl Respond for Recorder {
        async fn on_command(&mut self, command: Command) -> Flow {
            self.seen.push(command.id());
            self.remaining -= 1;
            if self.remaining == 0 {
                Flow::Shutdown
            } else {
                Flow::Continue
            }
        }
    }

    #[tokio::test]
    async fn test_commands_drain_in_enqueue_order() {
        let coordinator = Coordinator::new(64);

        let mut expected = Vec::new();
        for _ in 0..20 {
            let cmd = Command::job(Action::Process);
            expected.push(cmd.id());
            coordinator.request(cmd).await.unwrap();
        }

        let mut recorder = Recorder {
            seen: Vec::new(),
            remaining: 20,
        };
        coordinator.respond(&mut recorder).await.unwrap();
        assert_eq!(recorder.seen, expected);
    }

    #[tokio::test]
    async fn test_multiple_producers_preserve_per_producer_order() {
        let coordinator = Coordinator::new(128);

        let mut producers = Vec::new();
        for _ in 0..4 {
            let handle = coordinator.handle();
            producers.push(tokio::spawn(async move {
                let mut sent = Vec::new();
                for _ in 0..25 {
                    let cmd = Command::job(Action::Process);
                    sent.push(cmd.id());
                    handle.request(cmd).await.unwrap();
                }
                sent
            }));
        }

        let mut per_producer = Vec::new();
        for producer in producers {
            per_producer.push(producer.await.unwrap());
        }

        let mut recorder = Recorder {
            seen: Vec::new(),
            remaining: 100,
        };
        coordinator.respond(&mut recorder).await.unwrap();

        assert_eq!(recorder.seen.len(), 100);
        for sent in per_producer {
            let observed: Vec<u64> = recorder
                .seen
                .iter()
                .copied()
                .filter(|id| sent.contains(id))
                .collect();
            assert_eq!(observed, sent);
        }
    }

    #[tokio::test]
    async fn test_second_concurrent_respond_is_rejected() {
        let coordinator = std::sync::Arc::new(Coordinator::new(8));

        struct Blocker;

        #[async_trait]
        impl Respond for Blocker {
            async fn on_command(&mut self, _command: Command) -> Flow {
                Flow::Shutdown
            }
        }

        let first = coordinator.clone();
        let running = tokio::spawn(async move {
            let mut blocker = Blocker;
            first.respond(&mut blocker).await
        });

        // Give the first loop time to claim the receiver
        tokio::task::yield_now().await;

        let mut blocker = Blocker;
        let second = coordinator.respond(&mut blocker).await;
        assert!(matches!(second, Err(CoordinatorError::ConsumerActive)));

        coordinator.request(Command::job(Action::Check)).await.unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handler_may_enqueue_follow_ups() {
        let coordinator = Coordinator::new(8);
        let handle = coordinator.handle();

        struct Chaining {
            handle: CoordinatorHandle,
            actions: Vec<Action>,
        }

        #[async_trait]
        impl Respond for Chaining {
            async fn on_command(&mut self, command: Command) -> Flow {
                self.actions.push(command.action());
                match command.action() {
                    Action::Start => {
                        self.handle.request(Command::job(Action::Process)).await.unwrap();
                        Flow::Continue
                    }
                    _ => Flow::Shutdown,
                }
            }
        }

        coordinator.request(Command::job(Action::Start)).await.unwrap();

        let mut chaining = Chaining {
            handle,
            actions: Vec::new(),
        };
        coordinator.respond(&mut chaining).await.unwrap();
        assert_eq!(chaining.actions, vec![Action::Start, Action::Process]);
    }
}
