//! Module executor error types.

use std::fmt;
use std::path::PathBuf;

use shoal_core::StorageError;
use thiserror::Error;

use crate::engine::ExternKind;

/// Errors raised by a VM engine.
#[derive(Debug, Error)]
pub enum VmError {
    /// The engine could not be created with the requested configuration.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// Module bytes did not compile.
    #[error("compile failed: {0}")]
    Compile(String),

    /// The handle does not name a module compiled by this engine.
    #[error("unknown module handle {0}")]
    UnknownModule(usize),

    /// Linking or instantiating a module failed.
    #[error("instantiation failed: {0}")]
    Instantiate(String),

    /// `call` was made before `instantiate`.
    #[error("no module has been instantiated")]
    NotInstantiated,

    /// The called export is missing or has the wrong signature.
    #[error("export {0} is not a callable function")]
    BadExport(String),

    /// The guest faulted: trap, out of memory, stack overflow, interruption.
    #[error("{0}")]
    Trap(String),

    /// The engine was closed, possibly while a call was in flight.
    #[error("engine closed")]
    Closed,

    /// Host-side IO while preparing the sandbox.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for VM engine operations.
pub type VmResult<T> = Result<T, VmError>;

/// Errors raised while fetching module bytes from storage.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The locator could not be resolved.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A directory locator held no `.wasm` file.
    #[error("no .wasm file found in {}", .0.display())]
    NoModuleInDirectory(PathBuf),

    /// A directory locator held several `.wasm` files.
    #[error("expected exactly one .wasm file in {}, found {count}", .dir.display())]
    AmbiguousDirectory {
        /// Directory searched.
        dir: PathBuf,
        /// Number of candidates found.
        count: usize,
    },

    /// Reading the module failed.
    #[error("failed to read module {}: {source}", .path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// One import that nothing supplied provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingImport {
    /// Module that declares the import.
    pub importer: String,
    /// Module the import is requested from.
    pub module: String,
    /// Item name.
    pub name: String,
    /// Item kind.
    pub kind: ExternKind,
}

impl fmt::Display for MissingImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.module, self.name, self.kind)
    }
}

/// Capability mismatch found before instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required imports are not provided by any supplied module.
    #[error("module {importer} requires capabilities nobody provides: {}", join(.missing))]
    MissingImports {
        /// Module whose imports are unsatisfied.
        importer: String,
        /// The unsatisfied imports.
        missing: Vec<MissingImport>,
    },

    /// The entry point is not exported as a function.
    #[error("module {module} does not export function {entry_point}")]
    MissingEntryPoint {
        /// Entry module name.
        module: String,
        /// Requested entry point.
        entry_point: String,
    },

    /// The entry point exists but cannot be called without arguments.
    #[error("entry point {entry_point} of module {module} takes {params} parameters, expected none")]
    EntryPointSignature {
        /// Entry module name.
        module: String,
        /// Requested entry point.
        entry_point: String,
        /// Declared parameter count.
        params: usize,
    },
}

fn join(missing: &[MissingImport]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_import_names_the_capability() {
        let err = ValidationError::MissingImports {
            importer: "main".into(),
            missing: vec![
                MissingImport {
                    importer: "main".into(),
                    module: "env".into(),
                    name: "host_log".into(),
                    kind: ExternKind::Func,
                },
                MissingImport {
                    importer: "main".into(),
                    module: "math".into(),
                    name: "table".into(),
                    kind: ExternKind::Table,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "module main requires capabilities nobody provides: env.host_log (func), math.table (table)"
        );
    }
}
