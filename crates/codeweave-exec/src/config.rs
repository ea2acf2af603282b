//! Execution configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExecError, ExecResult};

pub const ENV_TIMEOUT_MS: &str = "CODEWEAVE_TIMEOUT_MS";
pub const ENV_SHELL: &str = "CODEWEAVE_SHELL";
pub const ENV_RUNNER_URL: &str = "CODEWEAVE_RUNNER_URL";

/// How and where gated scripts are run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecConfig {
    /// Wall-clock budget for one run (milliseconds).
    pub timeout_ms: u64,
    /// Shell used by the local runner as `<shell> -c <command>`.
    pub shell: String,
    /// When set, scripts are POSTed here instead of run locally.
    pub remote_url: Option<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            shell: "bash".to_string(),
            remote_url: None,
        }
    }
}

impl ExecConfig {
    /// Defaults overridden by `CODEWEAVE_*` environment variables.
    ///
    /// An unparsable timeout is reported rather than silently ignored.
    pub fn from_env() -> ExecResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ExecResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                ExecError::InvalidConfig(format!("{ENV_TIMEOUT_MS} is not a number: {raw:?}"))
            })?;
        }
        if let Some(shell) = lookup(ENV_SHELL).filter(|s| !s.trim().is_empty()) {
            config.shell = shell;
        }
        config.remote_url = lookup(ENV_RUNNER_URL).filter(|s| !s.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> ExecResult<()> {
        if self.timeout_ms == 0 {
            return Err(ExecError::InvalidConfig("timeout_ms must be positive".into()));
        }
        if self.shell.trim().is_empty() {
            return Err(ExecError::InvalidConfig("shell must not be empty".into()));
        }
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ExecError::InvalidConfig(format!(
                    "remote_url must be http(s): {url}"
                )));
            }
        }
        Ok(())
    }
}
