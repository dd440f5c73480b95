mod task;
pub use task::{DependencyMode, HttpMethod, Protocol, Task, TaskLevel};

mod task_host;
pub use task_host::TaskHost;

mod run_status;
pub use run_status::RunStatus;

mod task_log;
pub use task_log::{LogCompletion, NewTaskLog, TaskLog};

mod log_query;
pub use log_query::{LogPage, LogQuery};

mod notify;
pub use notify::{Notification, NotifyChannels, NotifyPolicy, NotifySettings, RunSummary};

mod run_key;
pub use run_key::RunKey;

mod error;
pub use error::ModelError;

/// Numeric identifier of a persisted task row.
pub type TaskId = i64;

/// Identifier of one run; equal to the id of the log row created at admission.
pub type RunId = i64;

/// Timeout value in seconds, as carried on the wire.
pub type TimeoutSecs = i32;
