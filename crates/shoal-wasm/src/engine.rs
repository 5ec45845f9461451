//! The narrow virtual machine interface the module executor drives.
//!
//! The executor never talks to a concrete runtime. It asks a
//! [`VmEngineFactory`] for one [`VmEngine`] per job, compiles the job's
//! modules through it, and instantiates and calls the entry point. Anything
//! implementing these traits can stand in for the real runtime, which keeps
//! the orchestration testable without an interpreter.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shoal_vfs::MountInfo;

use crate::error::VmResult;

/// Name of the reserved system interface module.
pub const SYSTEM_INTERFACE_MODULE: &str = "wasi_snapshot_preview1";

/// Engine-wide settings fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on linear memory, in 64 KiB pages. `None` leaves memory
    /// bounded only by the host.
    pub memory_limit_pages: Option<u64>,
}

/// Kind of an imported or exported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternKind {
    /// A function.
    Func,
    /// A linear memory.
    Memory,
    /// A table.
    Table,
    /// A global.
    Global,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Func => "func",
            Self::Memory => "memory",
            Self::Table => "table",
            Self::Global => "global",
        };
        f.write_str(label)
    }
}

/// An item a module requires from another module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRef {
    /// Module the item is requested from.
    pub module: String,
    /// Item name.
    pub name: String,
    /// Item kind.
    pub kind: ExternKind,
}

/// An item a module provides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportRef {
    /// Item name.
    pub name: String,
    /// Item kind.
    pub kind: ExternKind,
    /// Parameter count of a function export; zero for other kinds.
    #[serde(default)]
    pub params: usize,
}

impl ExportRef {
    /// A function export taking no parameters.
    #[must_use]
    pub fn func(name: impl Into<String>) -> Self {
        Self::new(name, ExternKind::Func)
    }

    /// An export of any kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ExternKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: 0,
        }
    }

    /// Set the parameter count.
    #[must_use]
    pub fn with_params(mut self, params: usize) -> Self {
        self.params = params;
        self
    }
}

/// A module compiled by a particular engine.
///
/// The handle is only meaningful to the engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    name: String,
    imports: Vec<ImportRef>,
    exports: Vec<ExportRef>,
    handle: usize,
}

impl CompiledModule {
    /// Describe a compiled module.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        imports: Vec<ImportRef>,
        exports: Vec<ExportRef>,
        handle: usize,
    ) -> Self {
        Self {
            name: name.into(),
            imports,
            exports,
            handle,
        }
    }

    /// Module name, used for linking and as the first argument.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Items the module requires.
    #[must_use]
    pub fn imports(&self) -> &[ImportRef] {
        &self.imports
    }

    /// Items the module provides.
    #[must_use]
    pub fn exports(&self) -> &[ExportRef] {
        &self.exports
    }

    /// Engine-specific handle.
    #[must_use]
    pub fn handle(&self) -> usize {
        self.handle
    }

    /// Whether the module exports `name` with the given kind.
    #[must_use]
    pub fn provides(&self, name: &str, kind: ExternKind) -> bool {
        self.exports.iter().any(|e| e.name == name && e.kind == kind)
    }
}

/// The exports of a module that exists before any job module is loaded,
/// such as the system interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    /// Module name imports refer to.
    pub name: String,
    /// Items it provides.
    pub exports: Vec<ExportRef>,
}

/// Everything an instance sees of the outside world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Argument vector, module name first.
    pub args: Vec<String>,
    /// Environment variables, in the order they are applied.
    pub env: Vec<(String, String)>,
    /// Filesystem mounts to attach.
    pub mounts: Vec<MountInfo>,
}

/// How a successful call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The function returned without a controlled exit.
    Returned,
    /// The guest requested exit with the given code.
    Exited(i32),
}

/// Standard output and error collected by an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Bytes written to standard output.
    pub stdout: Vec<u8>,
    /// Bytes written to standard error.
    pub stderr: Vec<u8>,
}

/// Creates one engine per job.
pub trait VmEngineFactory: Send + Sync {
    /// Create an engine honouring `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime rejects the configuration.
    fn create(&self, config: &EngineConfig) -> VmResult<Box<dyn VmEngine>>;
}

/// A virtual machine hosting the modules of a single job.
///
/// Calls are synchronous; the executor runs them on a blocking thread.
pub trait VmEngine: Send {
    /// Compile module bytes. `fallback_name` is used when the module does not
    /// name itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid module.
    fn compile(&mut self, bytes: &[u8], fallback_name: &str) -> VmResult<CompiledModule>;

    /// The reserved module every job may import from.
    fn system_interface(&self) -> &ModuleInterface;

    /// Instantiate `imports` in order, then `entry`, against `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if linking fails or a start function faults.
    fn instantiate(
        &mut self,
        config: &InstanceConfig,
        imports: &[CompiledModule],
        entry: &CompiledModule,
    ) -> VmResult<()>;

    /// Call an exported function of the entry instance with no arguments.
    ///
    /// # Errors
    ///
    /// Returns an error on any fault other than a controlled exit.
    fn call(&mut self, export: &str) -> VmResult<CallOutcome>;

    /// Drain the instance's captured standard streams.
    fn take_output(&mut self) -> CapturedOutput;

    /// Release the engine's resources. Later calls fail.
    fn close(&mut self);

    /// A handle that can close the engine from another thread, faulting any
    /// in-flight call.
    fn closer(&self) -> Arc<dyn VmCloser>;
}

/// Closes an engine from outside the thread that drives it.
pub trait VmCloser: Send + Sync {
    /// Close the engine.
    fn close(&self);
}
