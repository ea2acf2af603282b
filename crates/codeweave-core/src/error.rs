//! Error types for codeweave-core.
//!
//! The pipeline itself is total and never fails; only preview handles, which
//! touch the filesystem, can.

/// Errors produced while publishing or releasing a preview.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("failed to write preview document: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to release preview {id}: {source}")]
    Release {
        id: uuid::Uuid,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for preview operations.
pub type PreviewResult<T> = std::result::Result<T, PreviewError>;
