use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use tracing::debug;

use cronfleet_model::{HttpMethod, Protocol, RunId, Task, TimeoutSecs};

use super::{Handler, RunOutcome};
use crate::{CoreError, RunError};

const MAX_HTTP_TIMEOUT_SECS: TimeoutSecs = 300;

/// Runs HTTP tasks: the command is the URL.
///
/// POST splits the command on its first `?` into URL and form-encoded body.
/// Any status other than 200 fails the run but keeps the response body as output.
pub struct HttpHandler {
    client: reqwest::Client,
}

impl HttpHandler {
    pub fn new() -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn clamp_http_timeout(secs: TimeoutSecs) -> Duration {
    let secs = if secs <= 0 || secs > MAX_HTTP_TIMEOUT_SECS {
        MAX_HTTP_TIMEOUT_SECS
    } else {
        secs
    };
    Duration::from_secs(secs as u64)
}

#[async_trait]
impl Handler for HttpHandler {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, task: &Task) -> bool {
        task.protocol == Protocol::Http
    }

    async fn run(&self, task: &Task, run_id: RunId) -> RunOutcome {
        let request = match task.http_method {
            HttpMethod::Get => self.client.get(&task.command),
            HttpMethod::Post => {
                let (url, params) = task
                    .command
                    .split_once('?')
                    .unwrap_or((task.command.as_str(), ""));
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(params.to_string())
            }
        };

        let resp = match request.timeout(clamp_http_timeout(task.timeout)).send().await {
            Ok(resp) => resp,
            Err(e) => return RunOutcome::failed("", RunError::HttpTransport(e.to_string())),
        };
        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return RunOutcome::failed("", RunError::HttpTransport(e.to_string())),
        };
        debug!(task_id = task.id, run_id, status = status.as_u16(), "http task responded");

        if status != StatusCode::OK {
            return RunOutcome::failed(body, RunError::Http { status: status.as_u16() });
        }
        RunOutcome::ok(body)
    }
}
