#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Foreman Core
//!
//! Job and worker orchestration engine: accepts units of work, routes them
//! through a serialized command channel, drives worker lifecycle state
//! machines, retries with exponential backoff, and schedules delayed
//! resumption.
//!
//! ## Architecture
//!
//! Every job owns a single-consumer **coordinator** channel; commands from
//! any producer are drained strictly in arrival order by the job's
//! **runner**, which is the only component that mutates status. Transition
//! legality is decided by the pure [`jobs::status::rules`] functions.
//! Workers execute under the **executor**, which composes `work()` with an
//! ordered policy chain (rate limiting, circuit breaking, attempt caps) and
//! converts every failure mode into a typed outcome. The **manager** pulls
//! priority-weighted batches from queues, picks an available worker at
//! random, and submits pairs to a bounded pool.
//!
//! ## Module Organization
//!
//! - [`jobs`] - Identity, status rules, commands, coordinator, backoff,
//!   scheduler, and the lifecycle runner
//! - [`workers`] - Worker/queue contracts, executor, policies, registry,
//!   pool, and manager
//! - [`events`] - Status-change event fan-out
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use foreman_core::config::ForemanConfig;
//! use foreman_core::events::EventNotifier;
//! use foreman_core::workers::{Manager, WorkerRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     foreman_core::logging::init_structured_logging();
//!
//!     let config = ForemanConfig::load(None).expect("config");
//!     let registry = Arc::new(WorkerRegistry::new());
//!     let notifier = EventNotifier::new(config.event_capacity);
//!
//!     let manager = Manager::new(config, registry, notifier);
//!     // register queues and workers, then:
//!     manager.run().await;
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod jobs;
pub mod logging;
pub mod test_helpers;
pub mod workers;

pub use config::ForemanConfig;
pub use constants::{status_groups, system};
pub use error::{ForemanError, Result};
pub use events::{Event, EventNotifier};
pub use jobs::{
    Action, Backoff, Command, Coordinator, CoordinatorHandle, Identity, JobRunner, Scheduler,
    Status,
};
pub use workers::{
    Manager, Queue, Task, WorkExecutor, WorkResult, Worker, WorkerPool, WorkerRegistry,
};
