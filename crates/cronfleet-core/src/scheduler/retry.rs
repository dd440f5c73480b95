use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use cronfleet_model::{RunId, Task};

use crate::{Handler, RunError, RunOutcome};

pub(crate) struct JobResult {
    pub outcome: RunOutcome,
    /// Retries consumed; 0 when the first attempt settled it.
    pub retry_times: u8,
}

/// Pause before the next attempt: the fixed interval when set, else `attempt` minutes.
pub(crate) fn retry_delay(interval_secs: u16, attempt: u8) -> Duration {
    if interval_secs > 0 {
        Duration::from_secs(u64::from(interval_secs))
    } else {
        Duration::from_secs(60 * u64::from(attempt))
    }
}

/// Runs `handler` up to `1 + task.retry_times` times.
///
/// Each attempt runs on its own tokio task so a panicking handler surfaces as
/// [`RunError::Panic`] instead of unwinding through the scheduler. A panic or a manual
/// stop ends the loop immediately.
pub(crate) async fn exec_job(handler: Arc<dyn Handler>, task: Arc<Task>, run_id: RunId) -> JobResult {
    let mut outcome = RunOutcome::default();

    for attempt in 0..=task.retry_times {
        if attempt > 0 {
            let delay = retry_delay(task.retry_interval, attempt);
            warn!(
                task_id = task.id,
                run_id,
                attempt,
                delay_secs = delay.as_secs(),
                "run failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }

        let h = Arc::clone(&handler);
        let t = Arc::clone(&task);
        outcome = match tokio::spawn(async move { h.run(&t, run_id).await }).await {
            Ok(outcome) => outcome,
            Err(join) => {
                let msg = panic_message(join);
                error!(task_id = task.id, run_id, handler = handler.name(), panic = %msg, "handler panicked");
                return JobResult {
                    outcome: RunOutcome::failed("", RunError::Panic(msg)),
                    retry_times: attempt,
                };
            }
        };

        match &outcome.error {
            None => {
                return JobResult {
                    outcome,
                    retry_times: attempt,
                };
            }
            Some(e) if e.is_manual_stop() => {
                return JobResult {
                    outcome,
                    retry_times: attempt,
                };
            }
            Some(_) => {}
        }
    }

    JobResult {
        outcome,
        retry_times: task.retry_times,
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
