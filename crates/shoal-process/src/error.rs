//! Subprocess runner error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use shoal_core::{ExecutionFailure, FailureKind};
use thiserror::Error;

/// One of the two captured output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Errors raised while running a subprocess.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A backing file could not be created.
    #[error("failed to create {stream} backing file {path}: {source}")]
    BackingFile {
        /// Stream the file belongs to.
        stream: Stream,
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The subprocess could not be started.
    #[error("failed to start {command}: {source}")]
    Spawn {
        /// Program that failed to start.
        command: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Waiting on the subprocess failed.
    #[error("failed waiting for {command}: {source}")]
    Wait {
        /// Program being waited on.
        command: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Writing captured output to its backing file failed.
    #[error("failed writing {stream} backing file: {source}")]
    Write {
        /// Stream being written.
        stream: Stream,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A drain task panicked or was aborted.
    #[error("{stream} drain task failed: {message}")]
    Drain {
        /// Stream the task was draining.
        stream: Stream,
        /// Join error description.
        message: String,
    },

    /// A backing file could not be read back or inspected.
    #[error("failed reading {stream} backing file {path}: {source}")]
    Summary {
        /// Stream the file belongs to.
        stream: Stream,
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The subprocess exited with a non-zero code.
    #[error("{command} exited with code {code}")]
    NonZeroExit {
        /// Program that exited.
        command: String,
        /// Its exit code.
        code: i32,
    },

    /// The run was cancelled and the subprocess killed.
    #[error("{command} was cancelled")]
    Cancelled {
        /// Program that was killed.
        command: String,
    },
}

impl ProcessError {
    /// The failure category this error maps to.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::BackingFile { .. } | Self::Summary { .. } => FailureKind::Setup,
            _ => FailureKind::Runtime,
        }
    }
}

impl From<ProcessError> for ExecutionFailure {
    fn from(err: ProcessError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Convenience result type for subprocess operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let setup = ProcessError::BackingFile {
            stream: Stream::Stdout,
            path: PathBuf::from("/nope/stdout"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(setup.kind(), FailureKind::Setup);
        assert!(setup.to_string().contains("stdout backing file /nope/stdout"));

        let runtime = ProcessError::NonZeroExit {
            command: "false".into(),
            code: 1,
        };
        let failure = ExecutionFailure::from(runtime);
        assert_eq!(failure.kind, FailureKind::Runtime);
        assert_eq!(failure.message, "false exited with code 1");
    }
}
