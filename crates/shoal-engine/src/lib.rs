//! Shoal Engine - Job-level execution entry point.
//!
//! Dispatches a [`JobSpec`](shoal_core::JobSpec) to the bounded subprocess
//! runner or the sandboxed module executor, enforces the job's wall-clock
//! limit through cancellation, and persists the job-output record.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod executor;
pub mod results;

pub use error::{EngineError, EngineResult};
pub use executor::JobExecutor;
pub use results::{EXIT_CODE_FILE, STDERR_FILE, STDOUT_FILE, write_job_results};
