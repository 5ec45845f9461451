//! Shoal Process - Bounded output capture subprocess runner.
//!
//! Runs a subprocess with both output pipes drained concurrently into
//! size-capped backing files, so a chatty or hostile program can neither
//! exhaust host memory nor deadlock the caller on a full pipe. The caller
//! receives a small in-memory summary of each stream plus truncation flags in
//! the shared [`ExecutionResult`](shoal_core::ExecutionResult) shape.
//!
//! # Example
//!
//! ```rust,ignore
//! use shoal_process::ProcessRunner;
//! use shoal_core::OutputLimits;
//!
//! let runner = ProcessRunner::new(OutputLimits::default());
//! let result = runner
//!     .run_process_to_disk("python3", &["job.py"], &out_path, &err_path, None)
//!     .await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod capture;
pub mod error;
pub mod runner;

pub use error::{ProcessError, ProcessResult, Stream};
pub use runner::ProcessRunner;

use std::ffi::OsStr;
use std::path::Path;

use shoal_core::ExecutionResult;

/// Run a command with default limits and capture its full output in memory.
///
/// Intended for trusted internal tooling, not job code.
pub async fn run_process<S: AsRef<OsStr>>(command: &str, args: &[S]) -> ExecutionResult {
    ProcessRunner::default().run_process(command, args, None).await
}

/// Run a command with default limits, streaming output into capped backing
/// files at `stdout_path` and `stderr_path`.
pub async fn run_process_to_disk<S: AsRef<OsStr>>(
    command: &str,
    args: &[S],
    stdout_path: &Path,
    stderr_path: &Path,
) -> ExecutionResult {
    ProcessRunner::default()
        .run_process_to_disk(command, args, stdout_path, stderr_path, None)
        .await
}
