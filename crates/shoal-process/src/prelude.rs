//! Prelude module - commonly used types for convenient import.
//!
//! Use `use shoal_process::prelude::*;` to import all essential types.

pub use crate::{ProcessError, ProcessResult, ProcessRunner, Stream};
pub use crate::{run_process, run_process_to_disk};
