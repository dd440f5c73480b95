use super::{RunStatus, TaskId};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for listing log rows with filtering and pagination.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub task_id: Option<TaskId>,
    pub status: Option<RunStatus>,
    pub limit: usize,
    pub offset: usize,
}

/// Result of a paginated log query.
#[derive(Debug, Clone)]
pub struct LogPage<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl LogQuery {
    pub fn new() -> Self {
        Self {
            task_id: None,
            status: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
