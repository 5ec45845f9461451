//! Prelude module - commonly used types for convenient import.
//!
//! Use `use shoal_engine::prelude::*;` to import all essential types.

pub use crate::{EngineError, EngineResult, JobExecutor, write_job_results};
