//! Engine backed by wasmtime with WASI preview 1.
//!
//! Each job gets its own `wasmtime::Engine` with epoch interruption enabled,
//! so closing one job's engine interrupts only that job's guest code. Memory
//! is capped through store limits; stdio goes to in-memory pipes; mounts are
//! attached as preopened directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shoal_vfs::{MountAccess, MountInfo, MountKind};
use tempfile::TempDir;
use tracing::debug;
use wasmtime::{
    Config, Engine, ExternType, Instance, Linker, Module, Store, StoreLimits, StoreLimitsBuilder, Val,
};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

use crate::engine::{
    CallOutcome, CapturedOutput, CompiledModule, EngineConfig, ExportRef, ExternKind, ImportRef,
    InstanceConfig, ModuleInterface, VmCloser, VmEngine, VmEngineFactory,
};
use crate::error::{VmError, VmResult};
use crate::memory::bytes_for;
use crate::wasi::system_interface;

/// Default in-memory capacity of each captured stdio stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024 * 1024;

/// Creates wasmtime engines.
#[derive(Debug, Clone)]
pub struct WasmtimeEngineFactory {
    max_output_bytes: usize,
}

impl Default for WasmtimeEngineFactory {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl WasmtimeEngineFactory {
    /// Create a factory with the default stdio capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap each captured stdio stream at `bytes`. Guest writes past the cap
    /// fail inside the guest.
    #[must_use]
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

impl VmEngineFactory for WasmtimeEngineFactory {
    fn create(&self, config: &EngineConfig) -> VmResult<Box<dyn VmEngine>> {
        let mut wasm_config = Config::new();
        wasm_config.epoch_interruption(true);
        let engine =
            Engine::new(&wasm_config).map_err(|e| VmError::Config(format!("{e:#}")))?;

        let memory_limit = config
            .memory_limit_pages
            .map(|pages| usize::try_from(bytes_for(pages)).unwrap_or(usize::MAX));
        debug!(
            memory_limit_pages = ?config.memory_limit_pages,
            max_output_bytes = self.max_output_bytes,
            "Created wasmtime engine"
        );

        Ok(Box::new(WasmtimeEngine {
            engine,
            memory_limit,
            max_output_bytes: self.max_output_bytes,
            system: system_interface(),
            modules: Vec::new(),
            runtime: None,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct StoreState {
    wasi: WasiP1Ctx,
    limits: StoreLimits,
}

struct Runtime {
    store: Store<StoreState>,
    instance: Instance,
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
    // Holds staged single-file inputs alive until the instance is dropped.
    _staging: Option<TempDir>,
}

struct WasmtimeEngine {
    engine: Engine,
    memory_limit: Option<usize>,
    max_output_bytes: usize,
    system: ModuleInterface,
    modules: Vec<Module>,
    runtime: Option<Runtime>,
    closed: Arc<AtomicBool>,
}

struct WasmtimeCloser {
    engine: Engine,
    closed: Arc<AtomicBool>,
}

impl VmCloser for WasmtimeCloser {
    fn close(&self) {
        // Flag first: instantiate checks it after arming the epoch deadline.
        self.closed.store(true, Ordering::SeqCst);
        self.engine.increment_epoch();
    }
}

impl WasmtimeEngine {
    fn ensure_open(&self) -> VmResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(VmError::Closed)
        } else {
            Ok(())
        }
    }

    fn module(&self, compiled: &CompiledModule) -> VmResult<&Module> {
        self.modules
            .get(compiled.handle())
            .ok_or(VmError::UnknownModule(compiled.handle()))
    }

    fn build_store(&self, config: &InstanceConfig) -> VmResult<(Store<StoreState>, Pipes)> {
        let stdout = MemoryOutputPipe::new(self.max_output_bytes);
        let stderr = MemoryOutputPipe::new(self.max_output_bytes);

        let mut builder = WasiCtxBuilder::new();
        builder
            .args(config.args.as_slice())
            .stdout(stdout.clone())
            .stderr(stderr.clone());
        for (key, value) in &config.env {
            builder.env(key, value);
        }
        let staging = attach_mounts(&mut builder, &config.mounts)?;

        let mut limits = StoreLimitsBuilder::new();
        if let Some(bytes) = self.memory_limit {
            limits = limits.memory_size(bytes);
        }
        let mut store = Store::new(
            &self.engine,
            StoreState {
                wasi: builder.build_p1(),
                limits: limits.build(),
            },
        );
        store.limiter(|state| &mut state.limits);
        store.set_epoch_deadline(1);

        Ok((
            store,
            Pipes {
                stdout,
                stderr,
                staging,
            },
        ))
    }
}

// Parts of a runtime that exist before the instance does.
struct Pipes {
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
    staging: Option<TempDir>,
}

impl VmEngine for WasmtimeEngine {
    fn compile(&mut self, bytes: &[u8], fallback_name: &str) -> VmResult<CompiledModule> {
        self.ensure_open()?;
        let module =
            Module::new(&self.engine, bytes).map_err(|e| VmError::Compile(format!("{e:#}")))?;

        let name = module
            .name()
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback_name)
            .to_owned();
        let imports = module
            .imports()
            .filter_map(|import| {
                extern_kind(&import.ty()).map(|kind| ImportRef {
                    module: import.module().to_owned(),
                    name: import.name().to_owned(),
                    kind,
                })
            })
            .collect();
        let exports = module
            .exports()
            .filter_map(|export| {
                let ty = export.ty();
                let params = ty.func().map_or(0, |f| f.params().len());
                extern_kind(&ty)
                    .map(|kind| ExportRef::new(export.name(), kind).with_params(params))
            })
            .collect();

        let handle = self.modules.len();
        self.modules.push(module);
        debug!(module = %name, handle, "Compiled module");
        Ok(CompiledModule::new(name, imports, exports, handle))
    }

    fn system_interface(&self) -> &ModuleInterface {
        &self.system
    }

    fn instantiate(
        &mut self,
        config: &InstanceConfig,
        imports: &[CompiledModule],
        entry: &CompiledModule,
    ) -> VmResult<()> {
        self.ensure_open()?;
        let (mut store, pipes) = self.build_store(config)?;
        // A close that raced the deadline being armed would otherwise be lost.
        self.ensure_open()?;

        let instantiate_err = |e: wasmtime::Error| VmError::Instantiate(format!("{e:#}"));
        let mut linker: Linker<StoreState> = Linker::new(&self.engine);
        preview1::add_to_linker_sync(&mut linker, |state: &mut StoreState| &mut state.wasi)
            .map_err(instantiate_err)?;

        for import in imports {
            let module = self.module(import)?;
            linker
                .module(&mut store, import.name(), module)
                .map_err(instantiate_err)?;
            debug!(module = import.name(), "Instantiated import module");
        }
        let instance = linker
            .instantiate(&mut store, self.module(entry)?)
            .map_err(|e| {
                if self.closed.load(Ordering::SeqCst) {
                    VmError::Closed
                } else {
                    instantiate_err(e)
                }
            })?;
        debug!(module = entry.name(), "Instantiated entry module");

        self.runtime = Some(Runtime {
            store,
            instance,
            stdout: pipes.stdout,
            stderr: pipes.stderr,
            _staging: pipes.staging,
        });
        Ok(())
    }

    fn call(&mut self, export: &str) -> VmResult<CallOutcome> {
        self.ensure_open()?;
        let runtime = self.runtime.as_mut().ok_or(VmError::NotInstantiated)?;
        let func = runtime
            .instance
            .get_func(&mut runtime.store, export)
            .ok_or_else(|| VmError::BadExport(export.to_owned()))?;
        let ty = func.ty(&runtime.store);
        if ty.params().next().is_some() {
            return Err(VmError::BadExport(export.to_owned()));
        }
        // Results are discarded; only their count has to match.
        let mut results = vec![Val::I32(0); ty.results().len()];

        match func.call(&mut runtime.store, &[], &mut results) {
            Ok(()) => Ok(CallOutcome::Returned),
            Err(err) => {
                if let Some(exit) = err.downcast_ref::<I32Exit>() {
                    return Ok(CallOutcome::Exited(exit.0));
                }
                if self.closed.load(Ordering::SeqCst) {
                    return Err(VmError::Closed);
                }
                Err(VmError::Trap(format!("{err:#}")))
            },
        }
    }

    fn take_output(&mut self) -> CapturedOutput {
        self.runtime
            .as_ref()
            .map(|runtime| CapturedOutput {
                stdout: runtime.stdout.contents().to_vec(),
                stderr: runtime.stderr.contents().to_vec(),
            })
            .unwrap_or_default()
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.engine.increment_epoch();
        self.runtime = None;
        self.modules.clear();
    }

    fn closer(&self) -> Arc<dyn VmCloser> {
        Arc::new(WasmtimeCloser {
            engine: self.engine.clone(),
            closed: Arc::clone(&self.closed),
        })
    }
}

fn extern_kind(ty: &ExternType) -> Option<ExternKind> {
    #[allow(unreachable_patterns)]
    match ty {
        ExternType::Func(_) => Some(ExternKind::Func),
        ExternType::Memory(_) => Some(ExternKind::Memory),
        ExternType::Table(_) => Some(ExternKind::Table),
        ExternType::Global(_) => Some(ExternKind::Global),
        _ => None,
    }
}

fn attach_mounts(builder: &mut WasiCtxBuilder, mounts: &[MountInfo]) -> VmResult<Option<TempDir>> {
    let mut staging = None;
    for (index, mount) in mounts.iter().enumerate() {
        let (dir_perms, file_perms) = match mount.access {
            MountAccess::ReadOnly => (DirPerms::READ, FilePerms::READ),
            MountAccess::ReadWrite => (DirPerms::all(), FilePerms::all()),
        };
        let host_dir = match mount.kind {
            MountKind::File => stage_file(&mut staging, index, &mount.host_path)?,
            MountKind::Directory | MountKind::Output => mount.host_path.clone(),
        };
        builder
            .preopened_dir(&host_dir, &mount.guest_path, dir_perms, file_perms)
            .map_err(|e| {
                VmError::Instantiate(format!("cannot attach {}: {e:#}", mount.guest_path))
            })?;
        debug!(
            guest = %mount.guest_path,
            host = %host_dir.display(),
            access = ?mount.access,
            "Attached mount"
        );
    }
    Ok(staging)
}

/// Expose a single file as the only entry of a private directory.
fn stage_file(staging: &mut Option<TempDir>, index: usize, file: &Path) -> VmResult<PathBuf> {
    let root = match staging {
        Some(dir) => dir.path().to_path_buf(),
        None => {
            let dir = tempfile::Builder::new().prefix("shoal-stage-").tempdir()?;
            let path = dir.path().to_path_buf();
            *staging = Some(dir);
            path
        },
    };

    let name = file.file_name().ok_or_else(|| {
        VmError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", file.display()),
        ))
    })?;
    let dir = root.join(index.to_string());
    std::fs::create_dir(&dir)?;
    let target = dir.join(name);
    if std::fs::hard_link(file, &target).is_err() {
        std::fs::copy(file, &target)?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_file_reuses_one_root() {
        let src = tempfile::tempdir().unwrap();
        let a = src.path().join("a.bin");
        let b = src.path().join("b.bin");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let mut staging = None;
        let first = stage_file(&mut staging, 0, &a).unwrap();
        let second = stage_file(&mut staging, 1, &b).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.parent(), second.parent());
        assert_eq!(std::fs::read(first.join("a.bin")).unwrap(), b"a");
        assert_eq!(std::fs::read(second.join("b.bin")).unwrap(), b"b");

        let root = staging.unwrap();
        let root_path = root.path().to_path_buf();
        drop(root);
        assert!(!root_path.exists());
    }

    #[test]
    fn test_compile_rejects_garbage() {
        let factory = WasmtimeEngineFactory::new();
        let mut engine = factory.create(&EngineConfig::default()).unwrap();
        assert!(matches!(
            engine.compile(b"definitely not wasm", "x"),
            Err(VmError::Compile(_))
        ));
    }

    #[test]
    fn test_compile_reports_imports_and_exports() {
        let wasm = wat::parse_str(
            r#"(module $lib
                (import "wasi_snapshot_preview1" "fd_write"
                    (func (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "_start")))"#,
        )
        .unwrap();
        let factory = WasmtimeEngineFactory::new();
        let mut engine = factory.create(&EngineConfig::default()).unwrap();
        let compiled = engine.compile(&wasm, "fallback").unwrap();

        assert_eq!(compiled.name(), "lib");
        assert_eq!(
            compiled.imports(),
            &[ImportRef {
                module: "wasi_snapshot_preview1".into(),
                name: "fd_write".into(),
                kind: ExternKind::Func,
            }]
        );
        assert!(compiled.provides("_start", ExternKind::Func));
        assert!(compiled.provides("memory", ExternKind::Memory));
    }
}
