//! Event system: immutable status-change snapshots fanned out to subscribers.

pub mod publisher;

pub use publisher::{Event, EventNotifier, NotifierStats, NotifyError};
