//! In-memory runner for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{ExecError, ExecResult};
use crate::runner::{CommandOutput, CommandRunner};

/// Replays queued outputs and records every command it was asked to run.
///
/// With an empty queue it answers with an empty, successful output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<ExecResult<CommandOutput>>>,
    seen: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, output: CommandOutput) -> Self {
        lock(&self.responses).push_back(Ok(output));
        self
    }

    pub fn fail(self, error: ExecError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Commands received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str) -> ExecResult<CommandOutput> {
        lock(&self.seen).push(command.to_string());
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            Ok(CommandOutput {
                exit_code: Some(0),
                ..CommandOutput::default()
            })
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
