//! Capability checks run before anything is instantiated.

use crate::engine::{CompiledModule, ExportRef, ExternKind, ModuleInterface};
use crate::error::{MissingImport, ValidationError};

struct Provider<'a> {
    name: &'a str,
    exports: &'a [ExportRef],
}

impl Provider<'_> {
    fn provides(&self, name: &str, kind: ExternKind) -> bool {
        self.exports.iter().any(|e| e.name == name && e.kind == kind)
    }
}

/// Check that every import of every module is satisfied and that the entry
/// module exports `entry_point` as a function taking no parameters.
///
/// Import modules may only depend on the system interface and on import
/// modules declared before them, matching instantiation order. The entry
/// module may depend on all of them.
///
/// # Errors
///
/// Returns the first module with unsatisfied imports, listing every missing
/// item, or a missing entry point.
pub fn validate(
    system: &ModuleInterface,
    imports: &[CompiledModule],
    entry: &CompiledModule,
    entry_point: &str,
) -> Result<(), ValidationError> {
    let mut providers = vec![Provider {
        name: &system.name,
        exports: &system.exports,
    }];

    for module in imports {
        check_imports(module, &providers)?;
        providers.push(Provider {
            name: module.name(),
            exports: module.exports(),
        });
    }
    check_imports(entry, &providers)?;

    let export = entry
        .exports()
        .iter()
        .find(|e| e.name == entry_point && e.kind == ExternKind::Func)
        .ok_or_else(|| ValidationError::MissingEntryPoint {
            module: entry.name().to_owned(),
            entry_point: entry_point.to_owned(),
        })?;
    // Results are ignored, but there is nothing to pass as arguments.
    if export.params > 0 {
        return Err(ValidationError::EntryPointSignature {
            module: entry.name().to_owned(),
            entry_point: entry_point.to_owned(),
            params: export.params,
        });
    }
    Ok(())
}

fn check_imports(module: &CompiledModule, providers: &[Provider<'_>]) -> Result<(), ValidationError> {
    let missing: Vec<MissingImport> = module
        .imports()
        .iter()
        .filter(|import| {
            !providers
                .iter()
                .filter(|p| p.name == import.module)
                .any(|p| p.provides(&import.name, import.kind))
        })
        .map(|import| MissingImport {
            importer: module.name().to_owned(),
            module: import.module.clone(),
            name: import.name.clone(),
            kind: import.kind,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingImports {
            importer: module.name().to_owned(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImportRef;

    fn system() -> ModuleInterface {
        ModuleInterface {
            name: "wasi_snapshot_preview1".into(),
            exports: vec![ExportRef::func("fd_write"), ExportRef::func("proc_exit")],
        }
    }

    fn import(module: &str, name: &str) -> ImportRef {
        ImportRef {
            module: module.into(),
            name: name.into(),
            kind: ExternKind::Func,
        }
    }

    fn module(name: &str, imports: Vec<ImportRef>, exports: Vec<ExportRef>) -> CompiledModule {
        CompiledModule::new(name, imports, exports, 0)
    }

    #[test]
    fn test_system_imports_satisfied() {
        let entry = module(
            "main",
            vec![import("wasi_snapshot_preview1", "fd_write")],
            vec![ExportRef::func("_start")],
        );
        validate(&system(), &[], &entry, "_start").unwrap();
    }

    #[test]
    fn test_missing_capability_is_named() {
        let entry = module(
            "main",
            vec![
                import("wasi_snapshot_preview1", "fd_write"),
                import("wasi_snapshot_preview1", "sock_open"),
                import("env", "host_log"),
            ],
            vec![ExportRef::func("_start")],
        );
        let err = validate(&system(), &[], &entry, "_start").unwrap_err();
        let ValidationError::MissingImports { importer, missing } = err else {
            panic!("expected missing imports");
        };
        assert_eq!(importer, "main");
        let names: Vec<_> = missing.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["wasi_snapshot_preview1.sock_open (func)", "env.host_log (func)"]
        );
    }

    #[test]
    fn test_import_modules_provide_in_order() {
        let math = module("math", Vec::new(), vec![ExportRef::func("add")]);
        let stats = module("stats", vec![import("math", "add")], vec![ExportRef::func("mean")]);
        let entry = module(
            "main",
            vec![import("math", "add"), import("stats", "mean")],
            vec![ExportRef::func("_start")],
        );
        validate(&system(), &[math.clone(), stats.clone()], &entry, "_start").unwrap();

        // stats cannot see math when math comes after it
        let err = validate(&system(), &[stats, math], &entry, "_start").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingImports { ref importer, .. } if importer == "stats"
        ));
    }

    #[test]
    fn test_kind_mismatch_is_missing() {
        let lib = module(
            "lib",
            Vec::new(),
            vec![ExportRef::new("counter", ExternKind::Global)],
        );
        let entry = module("main", vec![import("lib", "counter")], vec![ExportRef::func("_start")]);
        assert!(validate(&system(), &[lib], &entry, "_start").is_err());
    }

    #[test]
    fn test_entry_point_must_be_exported_function() {
        let entry = module(
            "main",
            Vec::new(),
            vec![ExportRef::new("run", ExternKind::Memory)],
        );
        let err = validate(&system(), &[], &entry, "run").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingEntryPoint {
                module: "main".into(),
                entry_point: "run".into(),
            }
        );
    }

    #[test]
    fn test_entry_point_with_parameters_is_rejected() {
        let entry = module(
            "main",
            Vec::new(),
            vec![ExportRef::func("run").with_params(2)],
        );
        let err = validate(&system(), &[], &entry, "run").unwrap_err();
        assert_eq!(
            err,
            ValidationError::EntryPointSignature {
                module: "main".into(),
                entry_point: "run".into(),
                params: 2,
            }
        );
    }
}
