use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use cronfleet_exec::{OutputBuffer, ShellOutput, clean_html_entities, exec_shell_with_buffer};
use cronfleet_model::{RunId, TimeoutSecs};

use crate::proto::agent_server::Agent;
use crate::{MANUAL_STOP, STOP_COMMAND, TAIL_COMMAND, TaskRequest, TaskResponse, clamp_timeout};

/// Agent-side implementation of the `Agent.Run` RPC.
///
/// Every run gets a stop slot (removed when the run ends) and an output buffer
/// (kept for `retention` afterwards so a racing tail still sees it).
#[derive(Clone)]
pub struct AgentService {
    state: Arc<AgentState>,
}

struct AgentState {
    stops: DashMap<RunId, (u64, CancellationToken)>,
    outputs: DashMap<RunId, OutputBuffer>,
    generation: AtomicU64,
    retention: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Exited,
    Stopped,
    Deadline,
}

/// Clears a run's registrations when the handler finishes or its caller goes away.
struct RunGuard {
    state: Arc<AgentState>,
    id: RunId,
    generation: u64,
    buffer: OutputBuffer,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        self.state
            .stops
            .remove_if(&self.id, |_, (g, _)| *g == generation);

        let state = Arc::clone(&self.state);
        let buffer = self.buffer.clone();
        let id = self.id;
        tokio::spawn(async move {
            tokio::time::sleep(state.retention).await;
            state.outputs.remove_if(&id, |_, b| b.ptr_eq(&buffer));
        });
    }
}

impl AgentService {
    pub fn new(retention: Duration) -> Self {
        Self {
            state: Arc::new(AgentState {
                stops: DashMap::new(),
                outputs: DashMap::new(),
                generation: AtomicU64::new(0),
                retention,
            }),
        }
    }

    /// Number of runs currently executing.
    pub fn active_runs(&self) -> usize {
        self.state.stops.len()
    }

    /// Signals the stop slot of run `id`; unknown ids are ignored.
    pub fn stop_run(&self, id: RunId) -> bool {
        match self.state.stops.get(&id) {
            Some(slot) => {
                slot.1.cancel();
                true
            }
            None => false,
        }
    }

    /// Buffered output of run `id`, live while it runs and for the retention window after.
    pub fn tail_run(&self, id: RunId) -> TaskResponse {
        match self.state.outputs.get(&id) {
            Some(buffer) => TaskResponse {
                output: buffer.snapshot(),
                error: String::new(),
            },
            None => TaskResponse {
                output: String::new(),
                error: format!("no output for run {id}"),
            },
        }
    }

    /// Executes `command` as run `id`, racing its exit against the stop slot and the deadline.
    ///
    /// Dropping the returned future (caller disconnect) terminates the process group.
    pub async fn execute(&self, id: RunId, command: &str, timeout: TimeoutSecs) -> TaskResponse {
        let deadline = Duration::from_secs(clamp_timeout(timeout) as u64);

        let run = CancellationToken::new();
        let stop = CancellationToken::new();
        let buffer = OutputBuffer::new();
        let generation = self.state.generation.fetch_add(1, Ordering::Relaxed);
        self.state.stops.insert(id, (generation, stop.clone()));
        self.state.outputs.insert(id, buffer.clone());
        let _guard = RunGuard {
            state: Arc::clone(&self.state),
            id,
            generation,
            buffer: buffer.clone(),
        };

        // The shell runs on its own task so group termination completes even if we are dropped.
        let mut exec = tokio::spawn({
            let run = run.clone();
            let command = command.to_string();
            let buffer = buffer.clone();
            async move { exec_shell_with_buffer(&run, &command, &buffer).await }
        });
        let _caller = run.clone().drop_guard();

        let (cause, joined) = tokio::select! {
            joined = &mut exec => (Cause::Exited, Some(joined)),
            _ = stop.cancelled() => (Cause::Stopped, None),
            _ = tokio::time::sleep(deadline) => (Cause::Deadline, None),
        };
        let joined = match joined {
            Some(joined) => joined,
            None => {
                run.cancel();
                exec.await
            }
        };

        let out = joined.unwrap_or_else(|e| ShellOutput {
            output: buffer.snapshot(),
            error: Some(cronfleet_exec::ExecError::Io(format!("execution task failed: {e}"))),
        });

        let error = match (&out.error, cause) {
            (None, _) => String::new(),
            (Some(_), Cause::Stopped) => MANUAL_STOP.to_string(),
            (Some(e), _) => e.to_string(),
        };
        if error.is_empty() {
            info!(run_id = id, "run finished");
        } else {
            info!(run_id = id, ?cause, error = %error, "run failed");
        }

        TaskResponse {
            output: out.output,
            error,
        }
    }
}

#[tonic::async_trait]
impl Agent for AgentService {
    async fn run(&self, request: Request<TaskRequest>) -> Result<Response<TaskResponse>, Status> {
        let req = request.into_inner();
        let command = clean_html_entities(&req.command);

        let resp = match command.as_str() {
            STOP_COMMAND => {
                if !self.stop_run(req.id) {
                    warn!(run_id = req.id, "stop requested for unknown run");
                }
                TaskResponse::default()
            }
            TAIL_COMMAND => self.tail_run(req.id),
            _ => self.execute(req.id, &command, req.timeout).await,
        };
        Ok(Response::new(resp))
    }
}
