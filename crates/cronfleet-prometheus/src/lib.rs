//! Prometheus metrics backend for the cronfleet scheduler.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`cronfleet_core::MetricsBackend`]
//! that records run lifecycle metrics in a private [`Registry`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cronfleet_core::{MemoryStore, Scheduler};
//! use cronfleet_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let store = Arc::new(MemoryStore::new());
//!
//! let scheduler = Scheduler::builder(store.clone(), store.clone(), store)
//!     .metrics(Arc::new(metrics.clone()))
//!     .build()?;
//! # drop(scheduler);
//!
//! let text = metrics.encode_text()?;
//! # let _ = text;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `cronfleet_runs_started_total{protocol}` - Counter
//! - `cronfleet_runs_completed_total{protocol, status}` - Counter
//! - `cronfleet_run_duration_seconds{protocol}` - Histogram
//! - `cronfleet_admission_denied_total{protocol}` - Counter
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`. `cronfleet-schedd` exposes [`PrometheusMetrics::encode_text`]
//! through its axum router.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
