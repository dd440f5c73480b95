use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cronfleet_core::{LogStore, MemoryStore, Scheduler, SchedulerStatus, TaskStore};
use cronfleet_model::{LogQuery, Protocol, RunId, RunStatus, Task, TaskId, TaskLog};
use cronfleet_prometheus::PrometheusMetrics;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub store: MemoryStore,
    pub metrics: PrometheusMetrics,
}

/// Routes:
/// - GET /healthz - scheduler status and pool size
/// - GET /metrics - Prometheus text exposition
/// - POST /api/v1/tasks/{id}/run - run a task now
/// - POST /api/v1/runs/{run_id}/stop - stop a remote run on every host
/// - GET /api/v1/runs/{run_id}/tail - current output of a remote run
/// - GET /api/v1/logs - run logs, newest first
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/api/v1/tasks/{id}/run", post(run_task))
        .route("/api/v1/runs/{run_id}/stop", post(stop_run))
        .route("/api/v1/runs/{run_id}/tail", get(tail_run))
        .route("/api/v1/logs", get(list_logs))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    #[serde(flatten)]
    scheduler: SchedulerStatus,
    pool_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunTaskResponse {
    task_id: TaskId,
}

#[derive(Debug, Serialize, Deserialize)]
struct StopRunResponse {
    run_id: RunId,
    hosts: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct TailRunResponse {
    run_id: RunId,
    output: String,
}

#[derive(Debug, Deserialize)]
struct ListLogsParams {
    task_id: Option<TaskId>,
    /// running | finish | failure | cancel
    status: Option<String>,
    /// Max items per page (default 100, max 1000)
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListLogsResponse {
    logs: Vec<TaskLog>,
    total: usize,
}

/// GET /healthz
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pool_size = state.scheduler.rpc().map(|c| c.pool().size()).unwrap_or(0);
    Json(HealthResponse {
        scheduler: state.scheduler.status(),
        pool_size,
    })
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .encode_text()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// POST /api/v1/tasks/{id}/run
async fn run_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<impl IntoResponse, ApiError> {
    // detached; the run outlives the request
    let _run = state.scheduler.run_by_id(id).await?;
    info!(task_id = id, "manual run requested");
    Ok((StatusCode::ACCEPTED, Json(RunTaskResponse { task_id: id })))
}

/// POST /api/v1/runs/{run_id}/stop
async fn stop_run(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<impl IntoResponse, ApiError> {
    let (log, task) = remote_run(&state, run_id).await?;
    if log.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "run {run_id} already ended with status {}",
            log.status.as_str()
        )));
    }

    let hosts = state.scheduler.stop_all(&task, run_id)?;
    info!(task_id = task.id, run_id, hosts, "stop requested");
    Ok((StatusCode::ACCEPTED, Json(StopRunResponse { run_id, hosts })))
}

/// GET /api/v1/runs/{run_id}/tail
async fn tail_run(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> Result<impl IntoResponse, ApiError> {
    let (_log, task) = remote_run(&state, run_id).await?;
    let output = state.scheduler.tail(&task, run_id).await?;
    Ok(Json(TailRunResponse { run_id, output }))
}

/// Log row of `run_id` and its task; only remote-exec runs have hosts to talk to.
async fn remote_run(state: &AppState, run_id: RunId) -> Result<(TaskLog, Task), ApiError> {
    let log = state
        .store
        .get_log(run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run {run_id}")))?;
    if log.protocol != Protocol::RemoteExec {
        return Err(ApiError::InvalidRequest(format!(
            "run {run_id} is not a remote-exec run"
        )));
    }
    let task = state
        .store
        .get_task(log.task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {}", log.task_id)))?;
    Ok((log, task))
}

/// GET /api/v1/logs
///
/// Query params (all optional, combinable):
/// - ?task_id=7
/// - ?status=failure
/// - ?limit=50&offset=100
async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<ListLogsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut query = LogQuery::new();
    if let Some(task_id) = params.task_id {
        query = query.with_task(task_id);
    }
    if let Some(status) = params.status {
        query = query.with_status(parse_status(&status)?);
    }
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }

    let page = state.store.query_logs(&query).await?;
    debug!(count = page.items.len(), total = page.total, "logs listed");
    Ok(Json(ListLogsResponse {
        logs: page.items,
        total: page.total,
    }))
}

fn parse_status(s: &str) -> Result<RunStatus, ApiError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "running" => Ok(RunStatus::Running),
        "finish" | "finished" => Ok(RunStatus::Finish),
        "failure" | "failed" => Ok(RunStatus::Failure),
        "cancel" | "canceled" | "cancelled" => Ok(RunStatus::Cancel),
        _ => Err(ApiError::InvalidRequest(format!(
            "invalid status: '{s}' (valid: running, finish, failure, cancel)"
        ))),
    }
}
