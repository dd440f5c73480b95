use crate::CoreError;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Admission slots: cap on simultaneously executing run bodies.
    pub concurrency: usize,
    /// Page size used when loading tasks at startup.
    pub init_page_size: usize,
    /// Upper bound on pages loaded at startup.
    pub init_max_pages: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 500,
            init_page_size: 1000,
            init_max_pages: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.concurrency == 0 {
            return Err(CoreError::Config("concurrency must be > 0".into()));
        }
        if self.init_page_size == 0 {
            return Err(CoreError::Config("init_page_size must be > 0".into()));
        }
        Ok(())
    }
}
