use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cronfleet_model::{RunId, RunKey, TimeoutSecs};

use crate::{
    ConnectionPool, MANUAL_STOP, RpcError, STOP_COMMAND, TAIL_COMMAND, TAIL_TIMEOUT_SECS,
    TaskRequest, TaskResponse,
    sentinel::{CLIENT_GRACE, clamp_timeout},
};

const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Output of a remote call; `output` is kept even when `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub output: String,
    pub error: Option<RpcError>,
}

impl ExecOutput {
    fn failed(error: RpcError) -> Self {
        Self {
            output: String::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<TaskResponse> for ExecOutput {
    fn from(resp: TaskResponse) -> Self {
        let error = match resp.error.as_str() {
            "" => None,
            MANUAL_STOP => Some(RpcError::ManualStop),
            other => Some(RpcError::Remote(other.to_string())),
        };
        Self {
            output: resp.output,
            error,
        }
    }
}

/// Client for worker agents.
///
/// Each in-flight [`exec`](Self::exec) registers a cancellation handle under its [`RunKey`];
/// a later registration for the same key supersedes the earlier one.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

struct Inner {
    pool: Arc<dyn ConnectionPool>,
    runs: DashMap<RunKey, (u64, CancellationToken)>,
    generation: AtomicU64,
}

/// Removes a run's handle on drop, unless a newer call for the same key replaced it.
struct Registration<'a> {
    inner: &'a Inner,
    key: RunKey,
    generation: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.inner
            .runs
            .remove_if(&self.key, |_, (generation, _)| *generation == self.generation);
    }
}

impl RpcClient {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                runs: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.inner.pool
    }

    /// Evicts the pooled connection for `addr` (e.g. after a host edit).
    pub fn release(&self, addr: &str) {
        self.inner.pool.release(addr);
    }

    /// Number of calls currently registered for stop routing.
    pub fn in_flight(&self) -> usize {
        self.inner.runs.len()
    }

    /// Runs `command` on the agent at `addr` (`host:port`) as run `run_id`.
    ///
    /// The timeout is clamped into `(0, 86400]` and the call gives up locally after
    /// `timeout + 5s`.
    pub async fn exec(
        &self,
        addr: &str,
        command: &str,
        timeout: TimeoutSecs,
        run_id: RunId,
    ) -> ExecOutput {
        let request = TaskRequest {
            command: command.to_string(),
            timeout: clamp_timeout(timeout),
            id: run_id,
        };

        let key = RunKey::new(addr, run_id);
        let token = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        self.inner.runs.insert(key.clone(), (generation, token.clone()));
        let _registration = Registration {
            inner: &*self.inner,
            key,
            generation,
        };

        tokio::select! {
            out = self.call(addr, request) => out,
            _ = token.cancelled() => {
                debug!(addr, run_id, "remote call cancelled locally");
                ExecOutput::failed(RpcError::ManualStop)
            }
        }
    }

    /// Asks the agent to stop run `run_id`. Does not wait; delivery failures are logged.
    ///
    /// When the sentinel cannot be delivered, the local call for the same key is cancelled
    /// instead so the caller is not left waiting for the full deadline.
    pub fn stop(&self, addr: &str, run_id: RunId) -> JoinHandle<()> {
        let this = self.clone();
        let addr = addr.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.send_stop(&addr, run_id).await {
                warn!(addr = %addr, run_id, error = %e, "failed to deliver stop signal");
                let key = RunKey::new(addr, run_id);
                if let Some(entry) = this.inner.runs.get(&key) {
                    entry.1.cancel();
                }
            }
        })
    }

    /// Fetches the currently buffered output of run `run_id` without affecting it.
    pub async fn tail(&self, addr: &str, run_id: RunId) -> ExecOutput {
        let request = TaskRequest {
            command: TAIL_COMMAND.to_string(),
            timeout: TAIL_TIMEOUT_SECS,
            id: run_id,
        };
        self.call(addr, request).await
    }

    async fn send_stop(&self, addr: &str, run_id: RunId) -> Result<(), RpcError> {
        let mut client = self.inner.pool.get(addr).await?;

        let mut request = tonic::Request::new(TaskRequest {
            command: STOP_COMMAND.to_string(),
            timeout: 0,
            id: run_id,
        });
        request.set_timeout(STOP_TIMEOUT);

        match tokio::time::timeout(STOP_TIMEOUT, client.run(request)).await {
            Err(_) => Err(RpcError::Timeout),
            Ok(Err(status)) => Err(self.classify(addr, status)),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn call(&self, addr: &str, request: TaskRequest) -> ExecOutput {
        let mut client = match self.inner.pool.get(addr).await {
            Ok(client) => client,
            Err(e) => return ExecOutput::failed(e),
        };

        let deadline = Duration::from_secs(request.timeout.max(0) as u64) + CLIENT_GRACE;
        let mut request = tonic::Request::new(request);
        request.set_timeout(deadline);

        match tokio::time::timeout(deadline, client.run(request)).await {
            Err(_) => ExecOutput::failed(RpcError::Timeout),
            Ok(Err(status)) => ExecOutput::failed(self.classify(addr, status)),
            Ok(Ok(resp)) => ExecOutput::from(resp.into_inner()),
        }
    }

    fn classify(&self, addr: &str, status: tonic::Status) -> RpcError {
        let err = RpcError::from(status);
        if matches!(err, RpcError::Unavailable(_)) {
            self.inner.pool.release(addr);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_text_is_classified() {
        let ok = ExecOutput::from(TaskResponse {
            output: "done".into(),
            error: String::new(),
        });
        assert!(ok.is_success());

        let stopped = ExecOutput::from(TaskResponse {
            output: "partial".into(),
            error: MANUAL_STOP.into(),
        });
        assert_eq!(stopped.error, Some(RpcError::ManualStop));
        assert_eq!(stopped.output, "partial");

        let failed = ExecOutput::from(TaskResponse {
            output: "A\n".into(),
            error: "timeout killed".into(),
        });
        assert_eq!(failed.error, Some(RpcError::Remote("timeout killed".into())));
        assert_eq!(failed.output, "A\n");
    }
}
