//! The uniform execution result contract.
//!
//! Every backend (bounded subprocess runner, sandboxed module executor)
//! produces an [`ExecutionResult`] of the same shape, so downstream consumers
//! never need to know which backend ran a job.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exit code reported when no determinate exit code was observed.
pub const EXIT_CODE_UNSET: i32 = -1;

/// Category of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Execution never started: file creation, mount conflicts, module
    /// loading or compilation.
    Setup,
    /// The job requires a capability that nothing supplied provides. This is
    /// a job-definition error and must not be retried as-is.
    CapabilityMismatch,
    /// The job ran and faulted (trap, out of memory, cancellation, start
    /// failure of the subprocess).
    Runtime,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Setup => "setup failure",
            Self::CapabilityMismatch => "capability mismatch",
            Self::Runtime => "runtime fault",
        };
        f.write_str(label)
    }
}

/// An error carried inside an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ExecutionFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human readable cause.
    pub message: String,
}

impl ExecutionFailure {
    /// Create a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a setup failure.
    #[must_use]
    pub fn setup(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Setup, message)
    }

    /// Create a capability mismatch failure.
    #[must_use]
    pub fn capability_mismatch(message: impl Into<String>) -> Self {
        Self::new(FailureKind::CapabilityMismatch, message)
    }

    /// Create a runtime failure.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Runtime, message)
    }
}

/// Result of running one job, regardless of backend.
///
/// Created fresh per execution and owned by the caller after return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Bounded excerpt of standard output.
    ///
    /// Decoded lossily as UTF-8. When the excerpt is cut at its byte cap, a
    /// character split by the cut is dropped, so the excerpt may be up to
    /// three bytes shorter than the cap.
    pub stdout: String,
    /// Bounded excerpt of standard error, decoded like `stdout`.
    pub stderr: String,
    /// Whether the captured standard output is longer than `stdout`.
    pub stdout_truncated: bool,
    /// Whether the captured standard error is longer than `stderr`.
    pub stderr_truncated: bool,
    /// Exit code, or [`EXIT_CODE_UNSET`].
    pub exit_code: i32,
    /// Failure, if the execution did not complete normally.
    #[serde(default)]
    pub failure: Option<ExecutionFailure>,
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            exit_code: EXIT_CODE_UNSET,
            failure: None,
        }
    }
}

impl ExecutionResult {
    /// Create an empty result with an unset exit code.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a result carrying only a failure.
    #[must_use]
    pub fn failed(failure: ExecutionFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Set the exit code.
    #[must_use]
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Set the captured output.
    #[must_use]
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Check whether the job ran to completion with a zero exit code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.exit_code == 0
    }

    /// The failure kind, if any.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}
