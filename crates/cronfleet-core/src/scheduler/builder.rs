use std::sync::Arc;

use cronfleet_rpc::RpcClient;
use tokio_util::task::TaskTracker;

use super::{Inner, Scheduler};
use crate::{
    AdmissionSlots, CoreError, CronEngine, HandlerRouter, LogNotifier, LogStore, MetricsHandle,
    NoopMetrics, Notifier, PresenceSet, SchedulerConfig, Settings, TaskStore, TokioCron,
};

/// Assembles a [`Scheduler`] from its collaborators.
///
/// Defaults: [`TokioCron`], [`LogNotifier`], [`NoopMetrics`], no handlers and no RPC client.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    cron: Option<Arc<dyn CronEngine>>,
    router: HandlerRouter,
    tasks: Arc<dyn TaskStore>,
    logs: Arc<dyn LogStore>,
    settings: Arc<dyn Settings>,
    notifier: Option<Arc<dyn Notifier>>,
    metrics: Option<MetricsHandle>,
    rpc: Option<RpcClient>,
}

impl SchedulerBuilder {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        logs: Arc<dyn LogStore>,
        settings: Arc<dyn Settings>,
    ) -> Self {
        Self {
            cfg: SchedulerConfig::default(),
            cron: None,
            router: HandlerRouter::new(),
            tasks,
            logs,
            settings,
            notifier: None,
            metrics: None,
            rpc: None,
        }
    }

    pub fn config(mut self, cfg: SchedulerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn cron(mut self, cron: Arc<dyn CronEngine>) -> Self {
        self.cron = Some(cron);
        self
    }

    pub fn router(mut self, router: HandlerRouter) -> Self {
        self.router = router;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Client used by [`Scheduler::stop`]; remote handlers carry their own clone.
    pub fn rpc(mut self, rpc: RpcClient) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn build(self) -> Result<Scheduler, CoreError> {
        self.cfg.validate()?;
        let slots = AdmissionSlots::new(self.cfg.concurrency);

        Ok(Scheduler {
            inner: Arc::new(Inner {
                cron: self.cron.unwrap_or_else(|| Arc::new(TokioCron::new())),
                router: self.router,
                tasks: self.tasks,
                logs: self.logs,
                settings: self.settings,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
                metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
                rpc: self.rpc,
                presence: PresenceSet::new(),
                slots,
                in_flight: TaskTracker::new(),
                cfg: self.cfg,
            }),
        })
    }
}
