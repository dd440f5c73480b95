use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    OutputBuffer,
    entity::clean_html_entities,
    error::ExecError,
    util::{KILL_GRACE, kill_group, kill_lingering, script_command, work_dir, write_script},
};

const READ_CHUNK: usize = 1024;

/// Result of one shell run. `output` is kept on every path, including cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub output: String,
    pub error: Option<ExecError>,
}

impl ShellOutput {
    fn failed(output: String, error: ExecError) -> Self {
        Self {
            output,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs `command` until it exits or `cancel` fires.
pub async fn exec_shell(cancel: &CancellationToken, command: &str) -> ShellOutput {
    exec_shell_with_buffer(cancel, command, &OutputBuffer::new()).await
}

/// Like [`exec_shell`], streaming every chunk into `buffer` as it arrives.
///
/// On cancellation the process group is terminated (see `kill_group`), both pipes are drained
/// and [`ExecError::TimeoutKilled`] is returned alongside whatever was printed. This also holds
/// after the script itself exited while background children still keep the pipes open.
pub async fn exec_shell_with_buffer(
    cancel: &CancellationToken,
    command: &str,
    buffer: &OutputBuffer,
) -> ShellOutput {
    let command = clean_html_entities(command);

    // Held until the child is reaped; dropping it deletes the script.
    let script = match write_script(&command) {
        Ok(path) => path,
        Err(e) => return ShellOutput::failed(String::new(), e.into()),
    };

    let mut cmd = script_command(&script);
    cmd.current_dir(work_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    trace!(target: "cronfleet.exec.shell", script = %script.display(), "spawn");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ShellOutput::failed(String::new(), ExecError::Spawn(e.to_string())),
    };

    let pid = child.id();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, buffer.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, buffer.clone()));
    }

    let error = tokio::select! {
        status = child.wait() => {
            let exited = match status {
                Ok(status) => exit_error(status),
                Err(e) => Some(ExecError::from(e)),
            };
            // background children may still hold the pipes
            tokio::select! {
                _ = drain(&mut readers) => exited,
                _ = cancel.cancelled() => {
                    debug!(target: "cronfleet.exec.shell", ?pid, "cancelled after exit; terminating leftover group");
                    if let Some(pid) = pid {
                        kill_lingering(pid).await;
                    }
                    drain_within(&mut readers, KILL_GRACE).await;
                    Some(ExecError::TimeoutKilled)
                }
            }
        }
        _ = cancel.cancelled() => {
            debug!(target: "cronfleet.exec.shell", "cancelled; terminating process group");
            kill_group(&mut child).await;
            drain_within(&mut readers, KILL_GRACE).await;
            Some(ExecError::TimeoutKilled)
        }
    };
    drop(script);

    ShellOutput {
        output: buffer.snapshot(),
        error,
    }
}

fn spawn_reader<R>(mut pipe: R, buffer: OutputBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.append(&chunk[..n]),
            }
        }
    })
}

/// Awaits every reader; a reader is removed once joined, so a cancelled drain can be resumed.
async fn drain(readers: &mut Vec<JoinHandle<()>>) {
    while let Some(reader) = readers.last_mut() {
        let _ = reader.await;
        readers.pop();
    }
}

/// Drains the readers for at most `limit`; readers still blocked after that are aborted.
async fn drain_within(readers: &mut Vec<JoinHandle<()>>, limit: Duration) {
    if tokio::time::timeout(limit, drain(readers)).await.is_ok() {
        return;
    }
    debug!(target: "cronfleet.exec.shell", open = readers.len(), "pipes still open; abandoning readers");
    for reader in readers.drain(..) {
        reader.abort();
    }
}

fn exit_error(status: ExitStatus) -> Option<ExecError> {
    if status.success() {
        return None;
    }
    match status.code() {
        Some(code) => Some(ExecError::NonZeroExit { code }),
        None => Some(ExecError::KilledBySignal),
    }
}
