//! Storage collaborator error types.

use thiserror::Error;

/// Errors returned while resolving volumes and modules to local paths.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The locator uses a scheme this resolver cannot handle.
    #[error("unsupported storage locator: {0}")]
    UnsupportedLocator(String),

    /// The locator resolved to a path that does not exist.
    #[error("storage not found: {0}")]
    NotFound(String),

    /// A volume was submitted for preparation without a source.
    #[error("volume {name} has no source")]
    MissingSource {
        /// Name of the offending volume.
        name: String,
    },

    /// Native IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
