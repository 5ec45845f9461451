//! Drives one module job from spec to [`ExecutionResult`].
//!
//! Execution walks a fixed sequence of stages. The first stage that cannot be
//! reached ends the run with a failure naming it; nothing is retried.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use shoal_core::{
    ExecutionFailure, ExecutionResult, FailureKind, JobKind, JobSpec, ModuleSpec, StorageResolver,
};
use shoal_vfs::{MountInfo, compose};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{CallOutcome, CapturedOutput, EngineConfig, InstanceConfig, VmEngine, VmEngineFactory};
use crate::loader::{ModuleSource, load_all};
use crate::memory::pages_for;
use crate::validate::validate;

/// Stages of a module execution, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Nothing has happened yet.
    Created,
    /// Inputs and outputs are mounted.
    FilesystemComposed,
    /// A VM engine exists with the job's limits.
    EngineConfigured,
    /// Every module is fetched and compiled.
    ModulesLoaded,
    /// Every import is satisfied.
    Validated,
    /// Import modules and the entry module are instantiated.
    Instantiated,
    /// The entry point has been called.
    Ran,
    /// Output and exit code are packaged.
    ResultExtracted,
}

impl Stage {
    /// What reaching this stage involves, for failure messages.
    #[must_use]
    pub fn action(self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::FilesystemComposed => "compose filesystem",
            Self::EngineConfigured => "configure engine",
            Self::ModulesLoaded => "load modules",
            Self::Validated => "validate imports",
            Self::Instantiated => "instantiate",
            Self::Ran => "run entry point",
            Self::ResultExtracted => "extract result",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A stage that could not be reached.
#[derive(Debug)]
struct Failed {
    stage: Stage,
    kind: FailureKind,
    message: String,
}

impl Failed {
    fn new(stage: Stage, kind: FailureKind, message: impl fmt::Display) -> Self {
        Self {
            stage,
            kind,
            message: message.to_string(),
        }
    }

    fn setup(stage: Stage, error: impl fmt::Display) -> Self {
        Self::new(stage, FailureKind::Setup, error)
    }

    fn runtime(stage: Stage, error: impl fmt::Display) -> Self {
        Self::new(stage, FailureKind::Runtime, error)
    }

    fn cancelled(stage: Stage) -> Self {
        Self::new(stage, FailureKind::Runtime, "cancelled")
    }

    fn into_failure(self) -> ExecutionFailure {
        ExecutionFailure::new(self.kind, format!("{}: {}", self.stage.action(), self.message))
    }
}

type StageResult<T> = Result<T, Failed>;

/// Tracks and logs how far a job got.
#[derive(Clone)]
struct Progress {
    job_id: String,
    stage: Stage,
}

impl Progress {
    fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_owned(),
            stage: Stage::Created,
        }
    }

    fn reached(&mut self, stage: Stage) {
        self.stage = stage;
        debug!(job_id = %self.job_id, stage = %stage, "Module job advanced");
    }
}

/// Everything the blocking half of an execution needs.
struct Plan {
    entry: ModuleSource,
    imports: Vec<ModuleSource>,
    entry_point: String,
    parameters: Vec<String>,
    env: Vec<(String, String)>,
    mounts: Vec<MountInfo>,
}

/// Runs module jobs against a VM engine and a storage resolver.
///
/// Holds no per-job state, so one executor can serve concurrent jobs.
#[derive(Clone)]
pub struct ModuleExecutor {
    factory: Arc<dyn VmEngineFactory>,
    storage: Arc<dyn StorageResolver>,
}

impl fmt::Debug for ModuleExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleExecutor").finish_non_exhaustive()
    }
}

impl ModuleExecutor {
    /// Create an executor.
    #[must_use]
    pub fn new(factory: Arc<dyn VmEngineFactory>, storage: Arc<dyn StorageResolver>) -> Self {
        Self { factory, storage }
    }

    /// Execute a module job, writing outputs under `results_dir`.
    ///
    /// Never returns an error: every failure is carried in the result. When
    /// `cancel` fires the engine is closed and the in-flight call faults.
    pub async fn execute(
        &self,
        job: &JobSpec,
        results_dir: &Path,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let JobKind::Module(module) = &job.kind else {
            return ExecutionResult::failed(ExecutionFailure::setup(format!(
                "job {} is not a module job",
                job.id
            )));
        };

        let mut progress = Progress::new(&job.id);
        let mut output = CapturedOutput::default();
        let outcome = self
            .drive(job, module, results_dir, cancel, &mut progress, &mut output)
            .await;

        let mut result = ExecutionResult::new().with_output(
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        match outcome {
            Ok(CallOutcome::Exited(code)) => result.exit_code = code,
            Ok(CallOutcome::Returned) => {},
            Err(failed) => {
                warn!(
                    job_id = %job.id,
                    stage = %failed.stage,
                    kind = %failed.kind,
                    error = %failed.message,
                    "Module job failed"
                );
                result.failure = Some(failed.into_failure());
            },
        }
        progress.reached(Stage::ResultExtracted);

        info!(
            job_id = %job.id,
            exit_code = result.exit_code,
            failed = result.failure.is_some(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Module job finished"
        );
        result
    }

    async fn drive(
        &self,
        job: &JobSpec,
        module: &ModuleSpec,
        results_dir: &Path,
        cancel: &CancellationToken,
        progress: &mut Progress,
        output: &mut CapturedOutput,
    ) -> StageResult<CallOutcome> {
        let fs = until_cancelled(
            cancel,
            Stage::FilesystemComposed,
            compose(results_dir, &job.inputs, &job.outputs, self.storage.as_ref()),
        )
        .await?
        .map_err(|e| Failed::setup(Stage::FilesystemComposed, e))?;
        progress.reached(Stage::FilesystemComposed);

        let config = EngineConfig {
            memory_limit_pages: module.memory_limit.map(|limit| pages_for(limit.as_u64())),
        };
        let mut engine = self
            .factory
            .create(&config)
            .map_err(|e| Failed::setup(Stage::EngineConfigured, e))?;
        progress.reached(Stage::EngineConfigured);

        let loaded = until_cancelled(
            cancel,
            Stage::ModulesLoaded,
            load_all(
                self.storage.as_ref(),
                &module.entry_module,
                &module.import_modules,
            ),
        )
        .await
        .and_then(|r| r.map_err(|e| Failed::setup(Stage::ModulesLoaded, e)));
        let (entry, imports) = match loaded {
            Ok(sources) => sources,
            Err(failed) => {
                engine.close();
                return Err(failed);
            },
        };

        let plan = Plan {
            entry,
            imports,
            entry_point: module.entry_point.clone(),
            parameters: module.parameters.clone(),
            env: module.sorted_environment(),
            mounts: fs.mounts().cloned().collect(),
        };

        let closer = engine.closer();
        let mut tracker = progress.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            let outcome = run_engine(engine.as_mut(), &plan, &mut tracker);
            let output = engine.take_output();
            engine.close();
            (outcome, output, tracker)
        });

        let joined = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            joined = &mut task => Some(joined),
        };
        let joined = match joined {
            Some(joined) => joined,
            None => {
                debug!(job_id = %job.id, "Cancellation requested, closing engine");
                closer.close();
                task.await
            },
        };

        match joined {
            Ok((outcome, captured, tracker)) => {
                *progress = tracker;
                *output = captured;
                outcome
            },
            Err(e) => Err(Failed::runtime(
                progress.stage,
                format!("engine task failed: {e}"),
            )),
        }
    }
}

/// The synchronous half: compile, validate, instantiate, call.
fn run_engine(
    engine: &mut dyn VmEngine,
    plan: &Plan,
    progress: &mut Progress,
) -> StageResult<CallOutcome> {
    let entry = engine
        .compile(&plan.entry.bytes, &plan.entry.fallback_name)
        .map_err(|e| Failed::setup(Stage::ModulesLoaded, e))?;
    let mut imports = Vec::with_capacity(plan.imports.len());
    for source in &plan.imports {
        imports.push(
            engine
                .compile(&source.bytes, &source.fallback_name)
                .map_err(|e| Failed::setup(Stage::ModulesLoaded, e))?,
        );
    }
    progress.reached(Stage::ModulesLoaded);

    validate(engine.system_interface(), &imports, &entry, &plan.entry_point).map_err(|e| {
        Failed::new(Stage::Validated, FailureKind::CapabilityMismatch, e)
    })?;
    progress.reached(Stage::Validated);

    let args = std::iter::once(entry.name().to_owned())
        .chain(plan.parameters.iter().cloned())
        .collect();
    let config = InstanceConfig {
        args,
        env: plan.env.clone(),
        mounts: plan.mounts.clone(),
    };
    engine
        .instantiate(&config, &imports, &entry)
        .map_err(|e| Failed::runtime(Stage::Instantiated, e))?;
    progress.reached(Stage::Instantiated);

    let outcome = engine
        .call(&plan.entry_point)
        .map_err(|e| Failed::runtime(Stage::Ran, e))?;
    progress.reached(Stage::Ran);
    Ok(outcome)
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    stage: Stage,
    fut: F,
) -> StageResult<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Failed::cancelled(stage)),
        out = fut => Ok(out),
    }
}
