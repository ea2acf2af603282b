//! Runs commands through a local shell.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ExecConfig;
use crate::error::{ExecError, ExecResult};
use crate::runner::{CommandOutput, CommandRunner};

/// Spawns `<shell> -c <command>` with stdin closed.
///
/// Closing stdin makes a script that reads input fail fast with an EOF
/// error instead of hanging until the timeout.
#[derive(Debug, Clone)]
pub struct LocalShellRunner {
    config: ExecConfig,
}

impl LocalShellRunner {
    pub fn new(config: &ExecConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Default for LocalShellRunner {
    fn default() -> Self {
        Self::new(&ExecConfig::default())
    }
}

#[async_trait]
impl CommandRunner for LocalShellRunner {
    async fn run(&self, command: &str) -> ExecResult<CommandOutput> {
        let shell = &self.config.shell;
        debug!(shell = %shell, bytes = command.len(), "spawning local command");

        let child = Command::new(shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                shell: shell.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.config.timeout(), child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout(self.config.timeout_ms))??;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(timeout_ms: u64) -> LocalShellRunner {
        LocalShellRunner::new(&ExecConfig {
            timeout_ms,
            shell: "sh".to_string(),
            remote_url: None,
        })
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let out = runner(5_000).run("echo hello").await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success());
    }

    #[tokio::test]
    async fn test_captures_stderr_and_failure() {
        let out = runner(5_000).run("echo oops >&2; exit 3").await.unwrap();
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_stdin_is_closed() {
        let out = runner(5_000).run("read line || echo eof").await.unwrap();
        assert_eq!(out.stdout.trim(), "eof");
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = runner(100).run("sleep 5").await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout(100)));
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_error() {
        let runner = LocalShellRunner::new(&ExecConfig {
            shell: "/nonexistent/codeweave-shell".to_string(),
            ..ExecConfig::default()
        });
        let err = runner.run("true").await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
