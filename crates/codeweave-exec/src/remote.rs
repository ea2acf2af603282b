//! Client for a sandboxed runner reachable over HTTP.
//!
//! The runner accepts `POST <url>` with `{"command": "..."}` and answers with
//! `{"stdout": "...", "stderr": "...", "exit_code": 0}`; `exit_code` may be
//! absent or null.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ExecConfig;
use crate::error::{ExecError, ExecResult};
use crate::runner::{CommandOutput, CommandRunner};

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    command: &'a str,
}

/// Sends commands to a remote runner.
#[derive(Debug, Clone)]
pub struct RemoteCommandRunner {
    url: String,
    timeout_ms: u64,
    http_client: reqwest::Client,
}

impl RemoteCommandRunner {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> ExecResult<Self> {
        let config = ExecConfig {
            timeout_ms,
            ..ExecConfig::default()
        }
        .with_remote_url(url);
        Self::from_config(&config)
    }

    /// Build from config; fails when no `remote_url` is set.
    pub fn from_config(config: &ExecConfig) -> ExecResult<Self> {
        config.validate()?;
        let url = config
            .remote_url
            .clone()
            .ok_or_else(|| ExecError::InvalidConfig("remote_url is not set".into()))?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("codeweave-exec/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            url,
            timeout_ms: config.timeout_ms,
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CommandRunner for RemoteCommandRunner {
    async fn run(&self, command: &str) -> ExecResult<CommandOutput> {
        debug!(url = %self.url, bytes = command.len(), "posting command to remote runner");

        let response = self
            .http_client
            .post(&self.url)
            .json(&RunRequest { command })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecError::Timeout(self.timeout_ms)
                } else {
                    ExecError::Transport(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "remote runner refused command");
            return Err(ExecError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
