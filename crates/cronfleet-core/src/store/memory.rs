use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use cronfleet_model::{
    LogCompletion, LogPage, LogQuery, NewTaskLog, RunId, Task, TaskId, TaskLog,
};

use super::{LogStore, Settings, TaskStore};
use crate::StoreError;

const DEFAULT_CLEANUP_TIME: &str = "03:00";
const SECS_PER_DAY: u64 = 86_400;

/// In-memory tasks, logs and settings.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

struct MemoryInner {
    tasks: BTreeMap<TaskId, Task>,
    logs: BTreeMap<RunId, TaskLog>,
    next_log_id: RunId,
    cleanup_time: String,
    retention_days: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryInner {
                tasks: BTreeMap::new(),
                logs: BTreeMap::new(),
                next_log_id: 1,
                cleanup_time: DEFAULT_CLEANUP_TIME.to_string(),
                retention_days: 0,
            })),
        }
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        for task in tasks {
            store.upsert_task(task);
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upsert_task(&self, task: Task) {
        self.write().tasks.insert(task.id, task);
    }

    pub fn remove_task(&self, id: TaskId) -> Option<Task> {
        self.write().tasks.remove(&id)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks.values().cloned().collect()
    }

    /// All log rows, oldest first.
    pub fn logs(&self) -> Vec<TaskLog> {
        self.read().logs.values().cloned().collect()
    }

    pub fn logs_for(&self, task_id: TaskId) -> Vec<TaskLog> {
        self.read()
            .logs
            .values()
            .filter(|log| log.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn set_log_cleanup_time(&self, hhmm: impl Into<String>) {
        self.write().cleanup_time = hhmm.into();
    }

    pub fn set_log_retention_days(&self, days: u32) {
        self.write().retention_days = days;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn active_parents(&self, page: usize, page_size: usize) -> Result<Vec<Task>, StoreError> {
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        Ok(self
            .read()
            .tasks
            .values()
            .filter(|t| t.enabled && t.is_parent())
            .skip(skip)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.read().tasks.get(&id).cloned())
    }

    async fn dependency_tasks(&self, ids: &[TaskId]) -> Result<Vec<Task>, StoreError> {
        let inner = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|t| t.enabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn create_log(&self, log: NewTaskLog) -> Result<RunId, StoreError> {
        let mut inner = self.write();
        let id = inner.next_log_id;
        inner.next_log_id += 1;
        inner.logs.insert(id, TaskLog::from_new(id, log));
        Ok(id)
    }

    async fn complete_log(&self, id: RunId, done: LogCompletion) -> Result<(), StoreError> {
        let mut inner = self.write();
        let log = inner
            .logs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("log {id}")))?;
        log.apply(done);
        Ok(())
    }

    async fn get_log(&self, id: RunId) -> Result<Option<TaskLog>, StoreError> {
        Ok(self.read().logs.get(&id).cloned())
    }

    /// Newest first; `total` counts rows after filtering, before pagination.
    async fn query_logs(&self, q: &LogQuery) -> Result<LogPage<TaskLog>, StoreError> {
        let inner = self.read();
        let filtered: Vec<&TaskLog> = inner
            .logs
            .values()
            .rev()
            .filter(|log| q.task_id.is_none_or(|id| log.task_id == id))
            .filter(|log| q.status.is_none_or(|s| log.status == s))
            .collect();
        let total = filtered.len();

        let items = filtered
            .into_iter()
            .skip(q.offset)
            .take(q.limit)
            .cloned()
            .collect();
        Ok(LogPage { items, total })
    }

    async fn remove_logs_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let age = Duration::from_secs(u64::from(days) * SECS_PER_DAY);
        let Some(cutoff) = SystemTime::now().checked_sub(age) else {
            return Ok(0);
        };

        let mut inner = self.write();
        let before = inner.logs.len();
        inner.logs.retain(|_, log| log.start_time >= cutoff);
        Ok(before - inner.logs.len())
    }
}

#[async_trait]
impl Settings for MemoryStore {
    async fn log_cleanup_time(&self) -> Result<String, StoreError> {
        Ok(self.read().cleanup_time.clone())
    }

    async fn log_retention_days(&self) -> Result<u32, StoreError> {
        Ok(self.read().retention_days)
    }
}
