//! Scheduling and execution engine.
//!
//! [`Scheduler`] owns the cron triggers and runs every fired, manual or cascaded run through
//! the same body: single-instance admission, a global concurrency slot, the protocol
//! [`Handler`] with retries, log persistence, then fire-and-forget notification and
//! dependency cascade.

mod error;
pub use error::{CoreError, CronError, RunError, StoreError};

mod config;
pub use config::SchedulerConfig;

pub mod cron;
pub use cron::{CronEngine, CronEntry, JobFn, TokioCron};

pub mod admission;
pub use admission::{AdmissionSlots, PresenceGuard, PresenceSet};

pub mod handler;
pub use handler::{Handler, HandlerRouter, HttpHandler, RemoteHandler, RunOutcome, host_block};

pub mod store;
pub use store::{LogStore, MemoryStore, Settings, TaskStore};

mod notify;
pub use notify::{LogNotifier, Notifier, notifications_for};

mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics};

mod scheduler;
pub use scheduler::{LOG_CLEANUP_TRIGGER, Scheduler, SchedulerBuilder, SchedulerStatus};
