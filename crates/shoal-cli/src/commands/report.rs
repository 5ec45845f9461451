//! Running a job from the command line and reporting its result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use shoal_config::Config;
use shoal_core::{ExecutionResult, JobSpec, ShoalHome};
use shoal_engine::{JobExecutor, write_job_results};
use shoal_process::ProcessRunner;
use shoal_wasm::ModuleExecutor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config_bridge;

/// What `exec` and `wasm` print on stdout.
#[derive(Debug, Serialize)]
pub(crate) struct JobReport<'a> {
    pub(crate) job_id: &'a str,
    pub(crate) results_dir: &'a Path,
    #[serde(flatten)]
    pub(crate) result: &'a ExecutionResult,
}

/// Options shared by every job-running subcommand.
#[derive(Debug, Default)]
pub(crate) struct RunOptions {
    pub(crate) results: Option<PathBuf>,
    pub(crate) timeout_secs: Option<u64>,
}

/// A fresh job id.
pub(crate) fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn job_executor(cfg: &Config) -> JobExecutor {
    let modules = ModuleExecutor::new(
        Arc::new(config_bridge::to_engine_factory(cfg)),
        Arc::new(config_bridge::to_storage(cfg)),
    );
    JobExecutor::new(ProcessRunner::new(config_bridge::to_output_limits(cfg)), modules)
        .with_default_timeout(config_bridge::to_default_timeout(cfg))
}

fn results_dir(job_id: &str, explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => Ok(ShoalHome::resolve()
            .context("failed to resolve the shoal home directory")?
            .job_results_dir(job_id)),
    }
}

/// Run `job`, persist its results and print the report.
///
/// Ctrl-C cancels the job. Returns the job's result so the caller can pick
/// an exit status.
pub(crate) async fn run_and_report(
    cfg: &Config,
    mut job: JobSpec,
    options: RunOptions,
) -> Result<ExecutionResult> {
    if let Some(secs) = options.timeout_secs {
        job = job.with_timeout(Duration::from_secs(secs));
    }
    let results_dir = results_dir(&job.id, options.results)?;
    tokio::fs::create_dir_all(&results_dir)
        .await
        .with_context(|| format!("failed to create results directory {}", results_dir.display()))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling job");
            on_interrupt.cancel();
        }
    });

    info!(job_id = %job.id, results_dir = %results_dir.display(), "Running job");
    let result = job_executor(cfg).run(&job, &results_dir, cancel).await;
    interrupt.abort();

    write_job_results(&results_dir, &job, &result)
        .await
        .context("failed to write job results")?;

    let report = JobReport {
        job_id: &job.id,
        results_dir: &results_dir,
        result: &result,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(result)
}
