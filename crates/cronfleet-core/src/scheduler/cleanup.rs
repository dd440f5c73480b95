use std::sync::Arc;

use tracing::{error, info, warn};

use super::Scheduler;
use crate::{CoreError, JobFn};

/// Trigger name of the daily log-cleanup job.
pub const LOG_CLEANUP_TRIGGER: &str = "log-cleanup";

/// Daily at 03:00.
const DEFAULT_CLEANUP_SPEC: &str = "0 0 3 * * *";

/// Six-field cron spec firing daily at `HH:MM`; `None` if `hhmm` is malformed.
pub(crate) fn cleanup_spec(hhmm: &str) -> Option<String> {
    let (h, m) = hhmm.trim().split_once(':')?;
    let hour: u8 = h.trim().parse().ok()?;
    let minute: u8 = m.trim().parse().ok()?;
    (hour < 24 && minute < 60).then(|| format!("0 {minute} {hour} * * *"))
}

impl Scheduler {
    pub(crate) async fn register_log_cleanup(&self) -> Result<(), CoreError> {
        let configured = self.inner.settings.log_cleanup_time().await?;
        let spec = match cleanup_spec(&configured) {
            Some(spec) => spec,
            None => {
                warn!(time = %configured, "invalid log cleanup time; using 03:00");
                DEFAULT_CLEANUP_SPEC.to_string()
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let job: JobFn = Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(this) = Scheduler::from_weak(&weak) else {
                    return;
                };
                if let Err(e) = this.cleanup_logs().await {
                    error!(error = %e, "log cleanup failed");
                }
            })
        });

        self.inner.cron.add_func(&spec, LOG_CLEANUP_TRIGGER, job)?;
        info!(spec = %spec, "log cleanup trigger registered");
        Ok(())
    }

    /// Re-reads the cleanup time from settings and replaces the cleanup trigger.
    pub async fn reload_log_cleanup(&self) -> Result<(), CoreError> {
        self.inner.cron.remove_job(LOG_CLEANUP_TRIGGER);
        self.register_log_cleanup().await
    }

    /// Deletes log rows older than the configured retention. Returns the number removed;
    /// a retention of 0 keeps everything.
    pub async fn cleanup_logs(&self) -> Result<usize, CoreError> {
        let days = self.inner.settings.log_retention_days().await?;
        if days == 0 {
            return Ok(0);
        }
        let removed = self.inner.logs.remove_logs_older_than(days).await?;
        info!(days, removed, "old task logs removed");
        Ok(removed)
    }
}
