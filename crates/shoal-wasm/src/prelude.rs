//! Prelude module - commonly used types for convenient import.
//!
//! Use `use shoal_wasm::prelude::*;` to import all essential types.

pub use crate::execute_module;
pub use crate::{
    CallOutcome, CompiledModule, EngineConfig, InstanceConfig, ModuleExecutor, Stage, VmEngine,
    VmEngineFactory, VmError, VmResult, WasmtimeEngineFactory,
};
