//! Concrete virtual machine backends.

pub mod wasmtime;

pub use self::wasmtime::{DEFAULT_MAX_OUTPUT_BYTES, WasmtimeEngineFactory};
