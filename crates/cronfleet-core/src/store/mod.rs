//! Persistence and settings collaborators consumed by the scheduler.

mod memory;
pub use memory::MemoryStore;

use async_trait::async_trait;

use cronfleet_model::{LogCompletion, LogPage, LogQuery, NewTaskLog, RunId, Task, TaskId, TaskLog};

use crate::StoreError;

#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Enabled parent-level tasks, 1-based `page` of `page_size`, ordered by id.
    async fn active_parents(&self, page: usize, page_size: usize) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Enabled tasks among `ids`, in `ids` order; unknown or disabled ids are skipped.
    async fn dependency_tasks(&self, ids: &[TaskId]) -> Result<Vec<Task>, StoreError>;
}

#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    /// Creates a log row and returns its id, which doubles as the run id.
    async fn create_log(&self, log: NewTaskLog) -> Result<RunId, StoreError>;

    async fn complete_log(&self, id: RunId, done: LogCompletion) -> Result<(), StoreError>;

    async fn get_log(&self, id: RunId) -> Result<Option<TaskLog>, StoreError>;

    async fn query_logs(&self, query: &LogQuery) -> Result<LogPage<TaskLog>, StoreError>;

    /// Deletes rows started more than `days` days ago; returns how many were removed.
    async fn remove_logs_older_than(&self, days: u32) -> Result<usize, StoreError>;
}

/// Persisted settings, read at initialisation and reload time.
#[async_trait]
pub trait Settings: Send + Sync + 'static {
    /// Daily log-cleanup time as `HH:MM`.
    async fn log_cleanup_time(&self) -> Result<String, StoreError>;

    /// Log retention in days; 0 keeps logs forever.
    async fn log_retention_days(&self) -> Result<u32, StoreError>;
}
