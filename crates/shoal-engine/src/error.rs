//! Job engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while persisting job results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A results file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    WriteResult {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for job engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
