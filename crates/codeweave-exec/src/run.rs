//! Running gated scripts and turning pipeline renditions into outcomes.

use std::time::Instant;

use chrono::{DateTime, Utc};
use codeweave_core::gate::evaluate_with;
use codeweave_core::{
    emit_runner_error, emit_script_finished, explain_output, GateVerdict, PipelineConfig,
    Rendition, ScriptCommand,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExecError, ExecResult};
use crate::runner::CommandRunner;

/// What the user sees after a script ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub stdout: String,
    /// Verbatim stderr, or input guidance when the script hit EOF on stdin.
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub eof_rewritten: bool,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Result of handing a rendition to the execution layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The script ran.
    Ran(RunReport),
    /// HTML is previewed, never run.
    Preview,
    /// The pipeline declined to run; show `message` instead.
    Declined { message: String },
    NoCode,
}

/// Gate, run and explain one script with the default pipeline thresholds.
pub async fn run_script(
    script: &ScriptCommand,
    runner: &dyn CommandRunner,
) -> ExecResult<RunReport> {
    run_script_with(script, runner, &PipelineConfig::default()).await
}

/// Gate, run and explain one script.
///
/// The gate is checked again here, with the thresholds of the pipeline run
/// that produced the script, so a hand-built [`ScriptCommand`] cannot
/// bypass it.
pub async fn run_script_with(
    script: &ScriptCommand,
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
) -> ExecResult<RunReport> {
    let verdict = evaluate_with(&script.code, script.target, config.short_python_chars);
    if verdict != GateVerdict::Runnable {
        return Err(ExecError::NotRunnable(verdict.to_string()));
    }

    info!(target = %script.target, runner = runner.name(), "running script");
    let started_at = Utc::now();
    let start = Instant::now();

    let output = match runner.run(&script.command).await {
        Ok(output) => output,
        Err(e) => {
            emit_runner_error(script.target, &e);
            return Err(e);
        }
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let explained = explain_output(&output.stdout, &output.stderr);
    emit_script_finished(
        script.target,
        output.exit_code,
        duration_ms,
        explained.eof_rewritten,
    );

    Ok(RunReport {
        stdout: explained.stdout,
        stderr: explained.stderr,
        exit_code: output.exit_code,
        duration_ms,
        started_at,
        eof_rewritten: explained.eof_rewritten,
    })
}

/// Run a rendition produced with the default pipeline config.
pub async fn run_rendition(
    rendition: &Rendition,
    runner: &dyn CommandRunner,
) -> ExecResult<RunOutcome> {
    run_rendition_with(rendition, runner, &PipelineConfig::default()).await
}

/// Run a rendition if it is a script; otherwise say why nothing ran.
/// `config` must be the one the rendition was produced with.
pub async fn run_rendition_with(
    rendition: &Rendition,
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
) -> ExecResult<RunOutcome> {
    match rendition {
        Rendition::Script(script) => Ok(RunOutcome::Ran(
            run_script_with(script, runner, config).await?,
        )),
        Rendition::Preview(_) => Ok(RunOutcome::Preview),
        Rendition::Rejected { message, .. } | Rendition::NeedsInput { message, .. } => {
            Ok(RunOutcome::Declined {
                message: message.clone(),
            })
        }
        Rendition::NoCode => Ok(RunOutcome::NoCode),
    }
}
