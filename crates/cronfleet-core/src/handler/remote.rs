use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::info;

use cronfleet_model::{Protocol, RunId, Task, TaskHost};
use cronfleet_rpc::{ExecOutput, RpcClient};

use super::{Handler, RunOutcome};
use crate::RunError;

/// Runs remote-exec tasks on every associated host at once.
///
/// Per-host blocks are concatenated in completion order and the returned error is the one
/// collected last, which is not necessarily the first host to fail.
pub struct RemoteHandler {
    client: RpcClient,
}

impl RemoteHandler {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }
}

/// `Host: [alias-name:port]\n<error>\n<output>\n`, with the error line only when set.
pub fn host_block(host: &TaskHost, out: &ExecOutput) -> String {
    let mut block = format!("Host: [{}-{}:{}]\n", host.alias, host.name, host.port);
    if let Some(err) = &out.error {
        block.push_str(err.to_string().trim());
        block.push('\n');
    }
    block.push_str(out.output.trim());
    block.push('\n');
    block
}

#[async_trait]
impl Handler for RemoteHandler {
    fn name(&self) -> &'static str {
        "remote-exec"
    }

    fn supports(&self, task: &Task) -> bool {
        task.protocol == Protocol::RemoteExec
    }

    async fn run(&self, task: &Task, run_id: RunId) -> RunOutcome {
        if task.hosts.is_empty() {
            return RunOutcome::failed("", RunError::NoHosts);
        }
        info!(task_id = task.id, run_id, hosts = task.hosts.len(), "remote run started");

        let mut calls = JoinSet::new();
        for host in &task.hosts {
            let client = self.client.clone();
            let host = host.clone();
            let command = task.command.clone();
            let timeout = task.timeout;
            calls.spawn(async move {
                let out = client.exec(&host.addr(), &command, timeout, run_id).await;
                (host, out)
            });
        }

        let mut output = String::new();
        let mut error = None;
        while let Some(joined) = calls.join_next().await {
            let (host, out) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error = Some(RunError::Panic(e.to_string()));
                    continue;
                }
            };
            info!(
                task_id = task.id,
                run_id,
                addr = %host.addr(),
                output_len = out.output.len(),
                error = ?out.error,
                "remote call finished"
            );
            output.push_str(&host_block(&host, &out));
            if let Some(e) = out.error {
                error = Some(RunError::Remote(e));
            }
        }

        RunOutcome { output, error }
    }
}
