//! Error types for codeweave-exec

use thiserror::Error;

/// Errors that can occur while handing a script to a runner.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The runner did not finish within the configured budget
    #[error("command timed out after {0}ms")]
    Timeout(u64),

    /// The local shell could not be started
    #[error("failed to spawn `{shell}`: {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote runner could not be reached
    #[error("runner transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote runner answered with a non-success status
    #[error("runner returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The remote runner answered with something that is not a run result
    #[error("failed to decode runner response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The script did not pass the executability gate
    #[error("script is not runnable: {0}")]
    NotRunnable(String),

    /// Execution configuration is unusable
    #[error("invalid execution config: {0}")]
    InvalidConfig(String),

    /// IO error while collecting output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for execution operations
pub type ExecResult<T> = std::result::Result<T, ExecError>;
