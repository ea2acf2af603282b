//! The seam between gated scripts and whatever actually runs them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecResult;

/// Raw result of one command, before any user-facing rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// `None` when the process was ended by a signal or the runner did not say.
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a shell command line, typically a heredoc built by
/// [`codeweave_core::build_command`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> ExecResult<CommandOutput>;

    /// Short label for logs.
    fn name(&self) -> &str;
}
