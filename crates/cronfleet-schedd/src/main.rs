use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use cronfleet_core::{HandlerRouter, HttpHandler, MemoryStore, RemoteHandler, Scheduler};
use cronfleet_observe::{LoggerConfig, logger_init};
use cronfleet_prometheus::PrometheusMetrics;
use cronfleet_rpc::{GrpcPool, RpcClient};

mod cli;
mod error;
mod http;
mod tasks;

use cli::SchedArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SchedArgs::parse();

    // 1) Logger
    let log_cfg = LoggerConfig::from_args(&args.log_format, &args.log_level)?;
    logger_init(&log_cfg)?;

    // 2) Store
    let tasks = match &args.tasks {
        Some(path) => tasks::load(path)?,
        None => {
            warn!("no task file given; starting with an empty task list");
            Vec::new()
        }
    };
    let store = MemoryStore::with_tasks(tasks);
    store.set_log_cleanup_time(args.log_cleanup_time.clone());
    store.set_log_retention_days(args.log_retention_days);

    // 3) Transport + handlers
    let pool_cfg = args.pool_config();
    pool_cfg
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid pool config: {e}"))?;
    let rpc = RpcClient::new(Arc::new(GrpcPool::new(pool_cfg)?));

    let router = HandlerRouter::new()
        .with(Arc::new(HttpHandler::new()?))
        .with(Arc::new(RemoteHandler::new(rpc.clone())));

    // 4) Scheduler
    let metrics = PrometheusMetrics::new()?;
    let shared = Arc::new(store.clone());
    let scheduler = Scheduler::builder(shared.clone(), shared.clone(), shared)
        .config(args.scheduler_config())
        .router(router)
        .metrics(Arc::new(metrics.clone()))
        .rpc(rpc)
        .build()?;

    let added = scheduler.initialize().await?;
    info!(tasks = added, "scheduler started");

    // 5) Operator endpoint until SIGINT/SIGTERM
    let app = http::router(http::AppState {
        scheduler: scheduler.clone(),
        store,
        metrics,
    });
    let listener = tokio::net::TcpListener::bind(args.http_listen)
        .await
        .with_context(|| format!("binding {}", args.http_listen))?;
    info!(addr = %args.http_listen, "http endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6) Drain
    info!("shutting down; waiting for running tasks");
    scheduler.wait_and_exit().await;
    info!("scheduler stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable; waiting for ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}
