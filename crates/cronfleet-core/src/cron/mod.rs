//! Trigger registry contract and its tokio implementation.

mod engine;
pub use engine::TokioCron;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::CronError;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Body invoked on every fire. Each fire runs as its own task.
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Snapshot of one registered trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub name: String,
    pub spec: String,
    pub next: Option<DateTime<Local>>,
}

/// Named trigger registry.
pub trait CronEngine: Send + Sync + 'static {
    fn add_func(&self, spec: &str, name: &str, job: JobFn) -> Result<(), CronError>;

    /// Removes the trigger called `name`; unknown names are ignored.
    fn remove_job(&self, name: &str);

    fn entries(&self) -> Vec<CronEntry>;

    fn entry(&self, name: &str) -> Option<CronEntry> {
        self.entries().into_iter().find(|e| e.name == name)
    }

    /// Begins firing. Must be called from within a tokio runtime.
    fn start(&self);

    /// Stops firing new triggers; runs already started are unaffected.
    fn stop(&self);

    fn is_running(&self) -> bool;
}
