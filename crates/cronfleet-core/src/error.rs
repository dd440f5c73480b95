use thiserror::Error;

use cronfleet_model::{Protocol, TaskId};
use cronfleet_rpc::RpcError;

/// Failure of one handler invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("http status {status}")]
    Http { status: u16 },

    #[error("http request failed: {0}")]
    HttpTransport(String),

    #[error("task has no hosts")]
    NoHosts,

    #[error(transparent)]
    Remote(#[from] RpcError),

    #[error("handler panicked: {0}")]
    Panic(String),

    /// Free-form failure for custom handlers.
    #[error("{0}")]
    Failed(String),
}

impl RunError {
    /// A stopped run is recorded as cancelled rather than failed.
    pub fn is_manual_stop(&self) -> bool {
        matches!(self, RunError::Remote(e) if e.is_manual_stop())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronError {
    #[error("invalid cron spec {spec:?}: {reason}")]
    InvalidSpec { spec: String, reason: String },
    #[error("trigger already registered: {0}")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("child task {0} cannot own a trigger")]
    ChildTask(TaskId),

    #[error("no handler for protocol {0}")]
    NoHandler(&'static str),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("no rpc client configured")]
    NoRpcClient,

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub(crate) fn no_handler(protocol: Protocol) -> Self {
        CoreError::NoHandler(protocol.as_str())
    }
}
