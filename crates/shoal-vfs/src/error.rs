use std::path::PathBuf;

use shoal_core::StorageError;
use thiserror::Error;

/// Virtual filesystem errors.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Native IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Two mounts share a path, or one mount path contains another.
    #[error("Mount path {path} conflicts with existing mount {existing}")]
    MountConflict {
        /// The mount path being added.
        path: String,
        /// The mount path already present.
        existing: String,
    },

    /// A mount path is not a usable absolute guest path.
    #[error("Invalid mount path {path:?}: {reason}")]
    InvalidMountPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A declared volume is malformed.
    #[error("Invalid volume {name:?}: {reason}")]
    InvalidVolume {
        /// Volume name as declared.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An output directory already exists in the results directory.
    #[error("Output directory already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// Resolving an input through storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;
