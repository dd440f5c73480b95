//! Protocol handlers: one [`Handler`] per task protocol, picked by [`HandlerRouter`].

mod http;
pub use http::HttpHandler;

mod remote;
pub use remote::{RemoteHandler, host_block};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, trace};

use cronfleet_model::{RunId, Task};

use crate::RunError;

/// Result of one handler invocation. Output is kept on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub output: String,
    pub error: Option<RunError>,
}

impl RunOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(output: impl Into<String>, error: RunError) -> Self {
        Self {
            output: output.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Executes a task body for one run.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn supports(&self, task: &Task) -> bool;

    /// `run_id` is the id of the run's log row.
    async fn run(&self, task: &Task, run_id: RunId) -> RunOutcome;
}

#[derive(Default, Clone)]
pub struct HandlerRouter {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerRouter {
    #[inline]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    #[inline]
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn with(mut self, handler: Arc<dyn Handler>) -> Self {
        self.register(handler);
        self
    }

    /// First registered handler supporting `task`.
    #[instrument(level = "trace", skip(self, task), fields(task_id = task.id, protocol = task.protocol.as_str()))]
    pub fn pick(&self, task: &Task) -> Option<&Arc<dyn Handler>> {
        let handler = self.handlers.iter().find(|h| h.supports(task));
        if let Some(h) = handler {
            trace!(handler = h.name(), "handler selected");
        }
        handler
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
