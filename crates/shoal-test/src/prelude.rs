//! Prelude module - commonly used test helpers.
//!
//! Use `use shoal_test::prelude::*;` in test modules.

pub use crate::{StaticStorage, TestJobDir, init_test_tracing, module_job, process_job};
