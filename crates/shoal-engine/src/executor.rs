//! Dispatching a job to the backend that runs it.

use std::path::Path;
use std::time::Duration;

use shoal_core::{ExecutionFailure, ExecutionResult, JobKind, JobSpec, ProcessSpec};
use shoal_process::ProcessRunner;
use shoal_wasm::ModuleExecutor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::results::{STDERR_FILE, STDOUT_FILE};

/// Runs jobs of either kind under an optional wall-clock limit.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    runner: ProcessRunner,
    modules: ModuleExecutor,
    default_timeout: Option<Duration>,
}

impl JobExecutor {
    /// Create an executor with no default timeout.
    #[must_use]
    pub fn new(runner: ProcessRunner, modules: ModuleExecutor) -> Self {
        Self {
            runner,
            modules,
            default_timeout: None,
        }
    }

    /// Apply `timeout` to jobs that do not declare their own.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run `job`, writing everything it produces under `results_dir`.
    ///
    /// Cancelling `cancel` stops the job; so does the job's timeout, which
    /// cancels a child token and leaves `cancel` untouched.
    pub async fn run(
        &self,
        job: &JobSpec,
        results_dir: &Path,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let job_cancel = cancel.child_token();
        let timeout = job.timeout.or(self.default_timeout);
        let watchdog = timeout.map(|limit| spawn_watchdog(&job.id, limit, job_cancel.clone()));

        info!(job_id = %job.id, timeout_secs = timeout.map(|t| t.as_secs()), "Starting job");
        let result = match &job.kind {
            JobKind::Process(spec) => self.run_process(job, spec, results_dir, &job_cancel).await,
            JobKind::Module(_) => self.modules.execute(job, results_dir, &job_cancel).await,
        };

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        if job_cancel.is_cancelled() && !cancel.is_cancelled() {
            warn!(job_id = %job.id, "Job stopped by timeout");
        }
        result
    }

    async fn run_process(
        &self,
        job: &JobSpec,
        spec: &ProcessSpec,
        results_dir: &Path,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        if !job.inputs.is_empty() || !job.outputs.is_empty() {
            return ExecutionResult::failed(ExecutionFailure::setup(format!(
                "process job {} declares volumes; only module jobs can mount volumes",
                job.id
            )));
        }

        debug!(job_id = %job.id, command = %spec.command, "Dispatching process job");
        self.runner
            .run_process_to_disk(
                &spec.command,
                spec.args.as_slice(),
                &results_dir.join(STDOUT_FILE),
                &results_dir.join(STDERR_FILE),
                Some(cancel),
            )
            .await
    }
}

fn spawn_watchdog(
    job_id: &str,
    limit: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let job_id = job_id.to_owned();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(limit) => {
                debug!(job_id = %job_id, limit_secs = limit.as_secs(), "Job timeout elapsed");
                cancel.cancel();
            },
            () = cancel.cancelled() => {},
        }
    })
}
