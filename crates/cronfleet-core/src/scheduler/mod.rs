//! The scheduler: trigger registry plus the per-run lifecycle.

mod builder;
pub use builder::SchedulerBuilder;

mod cleanup;
pub use cleanup::LOG_CLEANUP_TRIGGER;

mod retry;
mod run;

mod status;
pub use status::SchedulerStatus;

use std::sync::{Arc, Weak};

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn};

use cronfleet_model::{RunId, Task, TaskHost, TaskId};
use cronfleet_rpc::RpcClient;

use crate::{
    AdmissionSlots, CoreError, CronEngine, HandlerRouter, JobFn, LogStore, MetricsHandle,
    Notifier, PresenceSet, SchedulerConfig, Settings, TaskStore, host_block,
};

/// Owns every trigger and all per-run shared state.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    cfg: SchedulerConfig,
    cron: Arc<dyn CronEngine>,
    router: HandlerRouter,
    tasks: Arc<dyn TaskStore>,
    logs: Arc<dyn LogStore>,
    settings: Arc<dyn Settings>,
    notifier: Arc<dyn Notifier>,
    metrics: MetricsHandle,
    rpc: Option<RpcClient>,
    presence: PresenceSet,
    slots: AdmissionSlots,
    in_flight: TaskTracker,
}

impl Scheduler {
    pub fn builder(
        tasks: Arc<dyn TaskStore>,
        logs: Arc<dyn LogStore>,
        settings: Arc<dyn Settings>,
    ) -> SchedulerBuilder {
        SchedulerBuilder::new(tasks, logs, settings)
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Starts the cron engine, registers a trigger for every enabled parent task and the
    /// log-cleanup trigger. Returns the number of task triggers registered.
    #[instrument(level = "info", skip(self))]
    pub async fn initialize(&self) -> Result<usize, CoreError> {
        self.inner.cron.start();

        let page_size = self.inner.cfg.init_page_size;
        let mut added = 0;
        for page in 1..=self.inner.cfg.init_max_pages {
            let tasks = self.inner.tasks.active_parents(page, page_size).await?;
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                info!(task_id = task.id, name = %task.name, hosts = task.hosts.len(), "adding task trigger");
                match self.add(task) {
                    Ok(()) => added += 1,
                    Err(e) => error!(error = %e, "failed to add task trigger"),
                }
            }
        }
        info!(added, "scheduled tasks initialized");

        self.register_log_cleanup().await?;
        Ok(added)
    }

    /// Registers a trigger for `task`. Child tasks never get their own trigger.
    pub fn add(&self, task: Task) -> Result<(), CoreError> {
        if !task.is_parent() {
            error!(task_id = task.id, "refusing to schedule a child task");
            return Err(CoreError::ChildTask(task.id));
        }
        if self.inner.router.pick(&task).is_none() {
            return Err(CoreError::no_handler(task.protocol));
        }

        let name = task.trigger_name();
        let spec = task.spec.clone();
        let job = self.job_for(task);
        self.inner.cron.add_func(&spec, &name, job)?;
        Ok(())
    }

    pub fn remove(&self, id: TaskId) {
        self.inner.cron.remove_job(&id.to_string());
    }

    /// Replaces the trigger for `task` (remove, then add).
    pub fn remove_and_add(&self, task: Task) -> Result<(), CoreError> {
        self.remove(task.id);
        self.add(task)
    }

    /// [`remove_and_add`](Self::remove_and_add) for each task; failures are logged.
    /// Returns how many triggers were registered.
    pub fn batch_add(&self, tasks: impl IntoIterator<Item = Task>) -> usize {
        let mut added = 0;
        for task in tasks {
            let id = task.id;
            match self.remove_and_add(task) {
                Ok(()) => added += 1,
                Err(e) => warn!(task_id = id, error = %e, "failed to add task trigger"),
            }
        }
        added
    }

    /// Next fire time of `task`'s live trigger; `None` for disabled, child or unscheduled tasks.
    pub fn next_run_time(&self, task: &Task) -> Option<DateTime<Local>> {
        if !task.is_parent() || !task.enabled {
            return None;
        }
        self.inner.cron.entry(&task.trigger_name())?.next
    }

    /// Runs `task` now on its own tokio task, bypassing its trigger.
    pub fn run(&self, task: Task) -> JoinHandle<()> {
        let this = self.clone();
        let token = self.inner.in_flight.token();
        tokio::spawn(async move {
            let _token = token;
            this.execute(Arc::new(task)).await
        })
    }

    /// Loads task `id` and [`run`](Self::run)s it.
    pub async fn run_by_id(&self, id: TaskId) -> Result<JoinHandle<()>, CoreError> {
        let task = self
            .inner
            .tasks
            .get_task(id)
            .await?
            .ok_or(CoreError::TaskNotFound(id))?;
        Ok(self.run(task))
    }

    /// Asks the agent on `host` to stop run `run_id`. Does not wait for delivery.
    pub fn stop(&self, host: &TaskHost, run_id: RunId) -> Result<(), CoreError> {
        let rpc = self.inner.rpc.as_ref().ok_or(CoreError::NoRpcClient)?;
        let _ = rpc.stop(&host.addr(), run_id);
        Ok(())
    }

    /// [`stop`](Self::stop) on every host of `task`. Returns how many stops were sent.
    pub fn stop_all(&self, task: &Task, run_id: RunId) -> Result<usize, CoreError> {
        for host in &task.hosts {
            self.stop(host, run_id)?;
        }
        Ok(task.hosts.len())
    }

    /// Current output of run `run_id` on every host of `task`, one host block per host.
    pub async fn tail(&self, task: &Task, run_id: RunId) -> Result<String, CoreError> {
        let rpc = self.inner.rpc.as_ref().ok_or(CoreError::NoRpcClient)?;
        let mut out = String::new();
        for host in &task.hosts {
            let res = rpc.tail(&host.addr(), run_id).await;
            out.push_str(&host_block(host, &res));
        }
        Ok(out)
    }

    pub fn rpc(&self) -> Option<&RpcClient> {
        self.inner.rpc.as_ref()
    }

    pub fn presence(&self) -> &PresenceSet {
        &self.inner.presence
    }

    /// Stops firing triggers, then waits until every run body has finished.
    pub async fn wait_and_exit(&self) {
        self.inner.cron.stop();
        self.inner.in_flight.close();
        info!(in_flight = self.inner.in_flight.len(), "waiting for running tasks");
        self.inner.in_flight.wait().await;
        info!("all runs drained");
    }

    fn job_for(&self, task: Task) -> JobFn {
        let weak = Arc::downgrade(&self.inner);
        let task = Arc::new(task);
        Arc::new(move || {
            let weak = weak.clone();
            let task = Arc::clone(&task);
            Box::pin(async move {
                if let Some(this) = Scheduler::from_weak(&weak) {
                    let _token = this.inner.in_flight.token();
                    this.execute(task).await;
                }
            })
        })
    }
}
