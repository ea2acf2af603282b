//! codeweave execution layer
//!
//! Hands gated [`ScriptCommand`](codeweave_core::ScriptCommand)s to a
//! [`CommandRunner`]: a local shell, a remote HTTP runner, or an in-memory
//! fake. Runner output is passed back verbatim except for the EOF rewrite.

pub mod config;
pub mod error;
pub mod fakes;
pub mod local;
pub mod remote;
pub mod run;
pub mod runner;

pub use config::ExecConfig;
pub use error::{ExecError, ExecResult};
pub use local::LocalShellRunner;
pub use remote::RemoteCommandRunner;
pub use run::{
    run_rendition, run_rendition_with, run_script, run_script_with, RunOutcome, RunReport,
};
pub use runner::{CommandOutput, CommandRunner};

/// Pick the runner a config asks for: remote when `remote_url` is set,
/// otherwise the local shell.
pub fn runner_from_config(config: &ExecConfig) -> ExecResult<Box<dyn CommandRunner>> {
    config.validate()?;
    if config.remote_url.is_some() {
        Ok(Box::new(RemoteCommandRunner::from_config(config)?))
    } else {
        Ok(Box::new(LocalShellRunner::new(config)))
    }
}
