//! A scripted engine for exercising the executor without a real VM.
//!
//! Module "bytes" are JSON documents describing the module's imports,
//! exports and what its entry point does when called. Everything the
//! executor asks of the engine is recorded in a shared [`ScriptLog`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{
    CallOutcome, CapturedOutput, CompiledModule, EngineConfig, ExportRef, ExternKind, ImportRef,
    InstanceConfig, ModuleInterface, SYSTEM_INTERFACE_MODULE, VmCloser, VmEngine,
    VmEngineFactory,
};
use crate::error::{VmError, VmResult};
use crate::memory::PAGE_SIZE;
use crate::wasi::system_interface;

/// What a scripted entry point does when called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedBehavior {
    /// Written to standard output.
    #[serde(default)]
    pub stdout: String,
    /// Written to standard error.
    #[serde(default)]
    pub stderr: String,
    /// Write the arguments after the module name, space separated, plus a
    /// newline.
    #[serde(default)]
    pub echo_args: bool,
    /// Write each environment variable as `KEY=VALUE` on its own line.
    #[serde(default)]
    pub echo_env: bool,
    /// Bytes of linear memory the call tries to reserve.
    #[serde(default)]
    pub allocate_bytes: u64,
    /// Controlled exit code.
    #[serde(default)]
    pub exit: Option<i32>,
    /// Fault with this message.
    #[serde(default)]
    pub trap: Option<String>,
    /// Spin until the engine is closed.
    #[serde(default)]
    pub hang: bool,
}

/// A module description understood by [`ScriptedEngineFactory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedModule {
    /// Module name. Empty falls back to the file name.
    #[serde(default)]
    pub name: String,
    /// Required imports.
    #[serde(default)]
    pub imports: Vec<ImportRef>,
    /// Provided exports.
    #[serde(default)]
    pub exports: Vec<ExportRef>,
    /// Behaviour of exported functions.
    #[serde(default)]
    pub behavior: ScriptedBehavior,
}

impl ScriptedModule {
    /// A command module exporting `_start` and importing `fd_write`.
    #[must_use]
    pub fn command(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
        .with_import(SYSTEM_INTERFACE_MODULE, "fd_write")
        .with_export("_start")
    }

    /// A library module with the given function exports and no imports.
    #[must_use]
    pub fn library(name: impl Into<String>, exports: &[&str]) -> Self {
        let mut module = Self {
            name: name.into(),
            ..Self::default()
        };
        for export in exports {
            module = module.with_export(*export);
        }
        module
    }

    /// Require a function import.
    #[must_use]
    pub fn with_import(mut self, module: &str, name: &str) -> Self {
        self.imports.push(ImportRef {
            module: module.to_owned(),
            name: name.to_owned(),
            kind: ExternKind::Func,
        });
        self
    }

    /// Export a function.
    #[must_use]
    pub fn with_export(mut self, name: &str) -> Self {
        self.exports.push(ExportRef::func(name));
        self
    }

    /// Set the call behaviour.
    #[must_use]
    pub fn with_behavior(mut self, behavior: ScriptedBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Serialise into module bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Everything the executor asked of scripted engines.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    /// Configurations passed to the factory, one per engine.
    pub engine_configs: Vec<EngineConfig>,
    /// Names of modules compiled, in order.
    pub compiled: Vec<String>,
    /// Configurations passed to `instantiate`.
    pub instance_configs: Vec<InstanceConfig>,
    /// Names of modules instantiated, in order.
    pub instantiated: Vec<String>,
    /// Exports called, in order.
    pub calls: Vec<String>,
    /// Number of engines closed.
    pub closed: usize,
}

type SharedLog = Arc<Mutex<ScriptLog>>;

fn record(log: &SharedLog, f: impl FnOnce(&mut ScriptLog)) {
    let mut guard = log.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard);
}

/// Factory producing scripted engines that share one log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngineFactory {
    log: SharedLog,
    fail_create: Option<String>,
}

impl ScriptedEngineFactory {
    /// Create a factory with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `create` fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_create: Some(message.into()),
            ..Self::default()
        }
    }

    /// Snapshot of the log.
    #[must_use]
    pub fn log(&self) -> ScriptLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VmEngineFactory for ScriptedEngineFactory {
    fn create(&self, config: &EngineConfig) -> VmResult<Box<dyn VmEngine>> {
        if let Some(message) = &self.fail_create {
            return Err(VmError::Config(message.clone()));
        }
        record(&self.log, |log| log.engine_configs.push(*config));
        Ok(Box::new(ScriptedEngine {
            config: *config,
            log: Arc::clone(&self.log),
            system: system_interface(),
            modules: Vec::new(),
            instance: None,
            output: CapturedOutput::default(),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct ScriptedEngine {
    config: EngineConfig,
    log: SharedLog,
    system: ModuleInterface,
    modules: Vec<ScriptedModule>,
    instance: Option<(usize, InstanceConfig)>,
    output: CapturedOutput,
    closed: Arc<AtomicBool>,
}

struct ScriptedCloser(Arc<AtomicBool>);

impl VmCloser for ScriptedCloser {
    fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ScriptedEngine {
    fn ensure_open(&self) -> VmResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(VmError::Closed)
        } else {
            Ok(())
        }
    }

    fn run(&mut self, behavior: &ScriptedBehavior, config: &InstanceConfig) -> VmResult<CallOutcome> {
        if let Some(pages) = self.config.memory_limit_pages {
            let limit = pages.saturating_mul(PAGE_SIZE);
            if behavior.allocate_bytes > limit {
                return Err(VmError::Trap(format!(
                    "memory limit exceeded: {} > {limit} bytes",
                    behavior.allocate_bytes
                )));
            }
        }

        self.output.stdout.extend_from_slice(behavior.stdout.as_bytes());
        self.output.stderr.extend_from_slice(behavior.stderr.as_bytes());
        if behavior.echo_args {
            let line = config.args.iter().skip(1).cloned().collect::<Vec<_>>().join(" ");
            self.output.stdout.extend_from_slice(line.as_bytes());
            self.output.stdout.push(b'\n');
        }
        if behavior.echo_env {
            for (key, value) in &config.env {
                self.output
                    .stdout
                    .extend_from_slice(format!("{key}={value}\n").as_bytes());
            }
        }

        if behavior.hang {
            while !self.closed.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(VmError::Closed);
        }
        if let Some(message) = &behavior.trap {
            return Err(VmError::Trap(message.clone()));
        }
        Ok(behavior.exit.map_or(CallOutcome::Returned, CallOutcome::Exited))
    }
}

impl VmEngine for ScriptedEngine {
    fn compile(&mut self, bytes: &[u8], fallback_name: &str) -> VmResult<CompiledModule> {
        self.ensure_open()?;
        let mut module: ScriptedModule =
            serde_json::from_slice(bytes).map_err(|e| VmError::Compile(e.to_string()))?;
        if module.name.is_empty() {
            fallback_name.clone_into(&mut module.name);
        }
        record(&self.log, |log| log.compiled.push(module.name.clone()));

        let handle = self.modules.len();
        let compiled = CompiledModule::new(
            module.name.clone(),
            module.imports.clone(),
            module.exports.clone(),
            handle,
        );
        self.modules.push(module);
        Ok(compiled)
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
        for module in imports.iter().chain(std::iter::once(entry)) {
            if module.handle() >= self.modules.len() {
                return Err(VmError::UnknownModule(module.handle()));
            }
            record(&self.log, |log| log.instantiated.push(module.name().to_owned()));
        }
        record(&self.log, |log| log.instance_configs.push(config.clone()));
        self.instance = Some((entry.handle(), config.clone()));
        Ok(())
    }

    fn call(&mut self, export: &str) -> VmResult<CallOutcome> {
        self.ensure_open()?;
        let (handle, config) = self.instance.clone().ok_or(VmError::NotInstantiated)?;
        record(&self.log, |log| log.calls.push(export.to_owned()));

        let module = self
            .modules
            .get(handle)
            .ok_or(VmError::UnknownModule(handle))?;
        if !module
            .exports
            .iter()
            .any(|e| e.name == export && e.kind == ExternKind::Func)
        {
            return Err(VmError::BadExport(export.to_owned()));
        }
        let behavior = module.behavior.clone();
        self.run(&behavior, &config)
    }

    fn take_output(&mut self) -> CapturedOutput {
        std::mem::take(&mut self.output)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.instance = None;
        record(&self.log, |log| log.closed = log.closed.saturating_add(1));
    }

    fn closer(&self) -> Arc<dyn VmCloser> {
        Arc::new(ScriptedCloser(Arc::clone(&self.closed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (ScriptedEngineFactory, Box<dyn VmEngine>) {
        let factory = ScriptedEngineFactory::new();
        let engine = factory.create(&EngineConfig::default()).unwrap();
        (factory, engine)
    }

    #[test]
    fn test_compile_uses_fallback_name() {
        let (factory, mut engine) = engine();
        let module = ScriptedModule::command("").to_bytes();
        let compiled = engine.compile(&module, "echo").unwrap();
        assert_eq!(compiled.name(), "echo");
        assert_eq!(factory.log().compiled, vec!["echo"]);

        assert!(matches!(
            engine.compile(b"not json", "x"),
            Err(VmError::Compile(_))
        ));
    }

    #[test]
    fn test_call_before_instantiate() {
        let (_, mut engine) = engine();
        assert!(matches!(engine.call("_start"), Err(VmError::NotInstantiated)));
    }

    #[test]
    fn test_echo_args_and_exit() {
        let (factory, mut engine) = engine();
        let bytes = ScriptedModule::command("echo")
            .with_behavior(ScriptedBehavior {
                echo_args: true,
                exit: Some(3),
                ..ScriptedBehavior::default()
            })
            .to_bytes();
        let entry = engine.compile(&bytes, "echo").unwrap();
        let config = InstanceConfig {
            args: vec!["echo".into(), "a".into(), "b".into()],
            ..InstanceConfig::default()
        };
        engine.instantiate(&config, &[], &entry).unwrap();
        assert_eq!(engine.call("_start").unwrap(), CallOutcome::Exited(3));
        assert_eq!(engine.take_output().stdout, b"a b\n");
        assert_eq!(factory.log().calls, vec!["_start"]);
    }

    #[test]
    fn test_closed_engine_refuses_work() {
        let (factory, mut engine) = engine();
        engine.closer().close();
        assert!(matches!(
            engine.compile(&ScriptedModule::command("m").to_bytes(), "m"),
            Err(VmError::Closed)
        ));
        engine.close();
        assert_eq!(factory.log().closed, 1);
    }
}
