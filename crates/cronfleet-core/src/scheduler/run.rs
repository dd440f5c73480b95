use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{error, info, warn};

use cronfleet_model::{
    DependencyMode, LogCompletion, NewTaskLog, RunId, RunStatus, Task,
};

use super::{Scheduler, retry::exec_job};
use crate::{PresenceGuard, RunOutcome, notifications_for};

/// A run that passed admission.
struct Admitted {
    log_id: RunId,
    /// Held for single-instance tasks until the handler returns.
    presence: Option<PresenceGuard>,
}

pub(crate) fn final_status(outcome: &RunOutcome) -> RunStatus {
    match &outcome.error {
        None => RunStatus::Finish,
        Some(e) if e.is_manual_stop() => RunStatus::Cancel,
        Some(_) => RunStatus::Failure,
    }
}

impl Scheduler {
    /// One run body: admission, slot, handler with retries, persistence,
    /// then notification (detached) and cascade (tracked).
    ///
    /// Callers hold an in-flight token for the duration.
    pub(crate) async fn execute(&self, task: Arc<Task>) {
        let Some(handler) = self.inner.router.pick(&task).cloned() else {
            error!(task_id = task.id, protocol = task.protocol.as_str(), "no handler for task");
            self.record_unhandled(&task).await;
            return;
        };
        let Some(Admitted { log_id, presence }) = self.admit(&task).await else {
            return;
        };

        let Some(_permit) = self.inner.slots.acquire().await else {
            error!(task_id = task.id, run_id = log_id, "admission slots closed");
            return;
        };

        info!(task_id = task.id, run_id = log_id, name = %task.name, "run started");
        self.inner.metrics.record_run_started(task.protocol);
        let started = Instant::now();

        let result = exec_job(handler, Arc::clone(&task), log_id).await;
        drop(presence);

        let status = final_status(&result.outcome);
        self.inner
            .metrics
            .record_run_completed(task.protocol, status, started.elapsed());
        info!(
            task_id = task.id,
            run_id = log_id,
            status = status.as_str(),
            retries = result.retry_times,
            "run finished"
        );

        let done = LogCompletion {
            status,
            result: result.outcome.output.clone(),
            retry_times: result.retry_times,
            end_time: SystemTime::now(),
        };
        if let Err(e) = self.inner.logs.complete_log(log_id, done).await {
            error!(task_id = task.id, run_id = log_id, error = %e, "failed to update task log");
        }

        let outcome = Arc::new(result.outcome);
        self.spawn_notify(Arc::clone(&task), Arc::clone(&outcome));
        self.spawn_cascade(task, outcome);
    }

    /// Single-instance check and log row creation.
    ///
    /// A denied run still leaves a Cancel row. If the Running row cannot be written the
    /// presence entry is released and the run is dropped.
    async fn admit(&self, task: &Task) -> Option<Admitted> {
        let presence = if task.is_single_instance() {
            match self.inner.presence.try_insert(task.id) {
                Some(guard) => Some(guard),
                None => {
                    info!(task_id = task.id, "task already running; run cancelled");
                    self.inner.metrics.record_admission_denied(task.protocol);
                    let denied = NewTaskLog::for_task(task, RunStatus::Cancel);
                    if let Err(e) = self.inner.logs.create_log(denied).await {
                        error!(task_id = task.id, error = %e, "failed to write cancel log");
                    }
                    return None;
                }
            }
        } else {
            None
        };

        match self
            .inner
            .logs
            .create_log(NewTaskLog::for_task(task, RunStatus::Running))
            .await
        {
            Ok(log_id) => Some(Admitted { log_id, presence }),
            Err(e) => {
                error!(task_id = task.id, error = %e, "failed to write task log; run aborted");
                None
            }
        }
    }

    /// Leaves a single Failure row for a run no handler accepts.
    async fn record_unhandled(&self, task: &Task) {
        let log_id = match self
            .inner
            .logs
            .create_log(NewTaskLog::for_task(task, RunStatus::Failure))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(task_id = task.id, error = %e, "failed to write task log");
                return;
            }
        };
        let done = LogCompletion {
            status: RunStatus::Failure,
            result: format!("no handler for protocol {}", task.protocol.as_str()),
            retry_times: 0,
            end_time: SystemTime::now(),
        };
        if let Err(e) = self.inner.logs.complete_log(log_id, done).await {
            error!(task_id = task.id, run_id = log_id, error = %e, "failed to update task log");
        }
    }

    /// Notifications are detached from the in-flight tracker; shutdown does not wait on them.
    fn spawn_notify(&self, task: Arc<Task>, outcome: Arc<RunOutcome>) {
        let notifications = notifications_for(&task, &outcome);
        if notifications.is_empty() {
            return;
        }
        let notifier = Arc::clone(&self.inner.notifier);
        tokio::spawn(async move {
            for n in notifications {
                notifier.push(n).await;
            }
        });
    }

    fn spawn_cascade(&self, parent: Arc<Task>, outcome: Arc<RunOutcome>) {
        if !parent.is_parent() || parent.dependency_task_ids.is_empty() {
            return;
        }
        if parent.dependency_mode == DependencyMode::Strong && !outcome.is_success() {
            info!(task_id = parent.id, "strong dependency and parent failed; children skipped");
            return;
        }

        let this = self.clone();
        self.inner.in_flight.spawn(async move { this.cascade(&parent).await });
    }

    async fn cascade(&self, parent: &Task) {
        let children = match self
            .inner
            .tasks
            .dependency_tasks(&parent.dependency_task_ids)
            .await
        {
            Ok(children) => children,
            Err(e) => {
                error!(task_id = parent.id, error = %e, "failed to load dependent tasks");
                return;
            }
        };
        if children.is_empty() {
            warn!(
                task_id = parent.id,
                deps = ?parent.dependency_task_ids,
                "no enabled dependent tasks"
            );
            return;
        }

        info!(task_id = parent.id, children = children.len(), "running dependent tasks");
        for mut child in children {
            child.spec = format!("dependency of task {}", parent.id);
            info!(task_id = parent.id, child_id = child.id, name = %child.name, "running dependent task");
            let _ = self.run(child);
        }
    }
}
