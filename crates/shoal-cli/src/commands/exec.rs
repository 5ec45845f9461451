//! `shoal exec`: run a host command with bounded output capture.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use shoal_config::Config;
use shoal_core::{ExecutionResult, JobKind, JobSpec, ProcessSpec};

use super::report::{RunOptions, new_job_id, run_and_report};

/// Arguments for `shoal exec`.
#[derive(Debug, Args)]
pub(crate) struct ExecArgs {
    /// Directory for stdout, stderr and exitCode (defaults to ~/.shoal/jobs/<id>)
    #[arg(long)]
    results: Option<PathBuf>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Command to run
    command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

pub(crate) async fn run_exec(cfg: &Config, args: ExecArgs) -> Result<ExecutionResult> {
    let job = JobSpec::new(
        new_job_id(),
        JobKind::Process(ProcessSpec::new(args.command, args.args)),
    );
    run_and_report(
        cfg,
        job,
        RunOptions {
            results: args.results,
            timeout_secs: args.timeout,
        },
    )
    .await
}
