use std::sync::Arc;
use std::time::Duration;

use cronfleet_model::{Protocol, RunStatus};

/// Sink for scheduler run metrics.
pub trait MetricsBackend: Send + Sync + 'static {
    fn record_run_started(&self, protocol: Protocol);

    /// `status` is the final log status of the run.
    fn record_run_completed(&self, protocol: Protocol, status: RunStatus, duration: Duration);

    /// A single-instance run was denied because another run of the task was active.
    fn record_admission_denied(&self, protocol: Protocol);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_run_started(&self, _protocol: Protocol) {}
    fn record_run_completed(&self, _protocol: Protocol, _status: RunStatus, _duration: Duration) {}
    fn record_admission_denied(&self, _protocol: Protocol) {}
}
