use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use cronfleet_core::MetricsBackend;
use cronfleet_model::{Protocol, RunStatus};

const NAMESPACE: &str = "cronfleet";

/// Run durations span HTTP pings to multi-hour batch jobs.
const DURATION_BUCKETS: &[f64] = &[
    0.05, 0.25, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0,
];

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    started: IntCounterVec,
    completed: IntCounterVec,
    duration: HistogramVec,
    denied: IntCounterVec,
}

impl PrometheusMetrics {
    /// Backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Registers every collector in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let started = IntCounterVec::new(
            Opts::new("runs_started_total", "Run bodies that passed admission")
                .namespace(NAMESPACE),
            &["protocol"],
        )?;
        let completed = IntCounterVec::new(
            Opts::new("runs_completed_total", "Finished runs by final log status")
                .namespace(NAMESPACE),
            &["protocol", "status"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("run_duration_seconds", "Wall time of a run including retries")
                .namespace(NAMESPACE)
                .buckets(DURATION_BUCKETS.to_vec()),
            &["protocol"],
        )?;
        let denied = IntCounterVec::new(
            Opts::new(
                "admission_denied_total",
                "Runs cancelled because the single-instance task was already running",
            )
            .namespace(NAMESPACE),
            &["protocol"],
        )?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(completed.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(denied.clone()))?;

        Ok(Self {
            registry,
            started,
            completed,
            duration,
            denied,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_run_started(&self, protocol: Protocol) {
        self.started.with_label_values(&[protocol.as_str()]).inc();
    }

    fn record_run_completed(&self, protocol: Protocol, status: RunStatus, duration: Duration) {
        self.completed
            .with_label_values(&[protocol.as_str(), status.as_str()])
            .inc();
        self.duration
            .with_label_values(&[protocol.as_str()])
            .observe(duration.as_secs_f64());
    }

    fn record_admission_denied(&self, protocol: Protocol) {
        self.denied.with_label_values(&[protocol.as_str()]).inc();
    }
}
