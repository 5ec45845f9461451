//! Shoal WASM - Sandboxed WebAssembly module executor.
//!
//! Runs a job's entry module inside a virtual machine with a memory ceiling,
//! a deterministic argument vector and environment, in-memory stdio and the
//! job filesystem composed by `shoal-vfs`. The executor is written against
//! the narrow [`VmEngine`] interface; [`WasmtimeEngineFactory`] is the real
//! backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shoal_core::LocalStorage;
//! use shoal_wasm::{ModuleExecutor, WasmtimeEngineFactory};
//!
//! let executor = ModuleExecutor::new(
//!     Arc::new(WasmtimeEngineFactory::new()),
//!     Arc::new(LocalStorage::new()),
//! );
//! let result = executor.execute(&job, &results_dir, &cancel).await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod backend;
pub mod engine;
pub mod error;
pub mod executor;
pub mod loader;
pub mod memory;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod validate;
pub mod wasi;

pub use backend::WasmtimeEngineFactory;
pub use engine::{
    CallOutcome, CapturedOutput, CompiledModule, EngineConfig, ExportRef, ExternKind, ImportRef,
    InstanceConfig, ModuleInterface, SYSTEM_INTERFACE_MODULE, VmCloser, VmEngine,
    VmEngineFactory,
};
pub use error::{LoadError, MissingImport, ValidationError, VmError, VmResult};
pub use executor::{ModuleExecutor, Stage};

use std::path::Path;
use std::sync::Arc;

use shoal_core::{ExecutionResult, JobSpec, LocalStorage};
use tokio_util::sync::CancellationToken;

/// Execute a module job on wasmtime, resolving locators on the local
/// filesystem.
pub async fn execute_module(job: &JobSpec, results_dir: &Path) -> ExecutionResult {
    ModuleExecutor::new(
        Arc::new(WasmtimeEngineFactory::new()),
        Arc::new(LocalStorage::new()),
    )
    .execute(job, results_dir, &CancellationToken::new())
    .await
}
