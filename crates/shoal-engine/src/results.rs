//! Persisting an execution result into the job results directory.

use std::path::Path;

use shoal_core::{ExecutionResult, JobKind, JobSpec};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// File holding captured standard output.
pub const STDOUT_FILE: &str = "stdout";
/// File holding captured standard error.
pub const STDERR_FILE: &str = "stderr";
/// File holding the decimal exit code.
pub const EXIT_CODE_FILE: &str = "exitCode";

/// Write the job-output record for `result` under `results_dir`.
///
/// Process jobs already streamed their output into `stdout` and `stderr`
/// backing files there, so only the exit code is written for them. Module
/// jobs get all three files.
///
/// # Errors
///
/// Returns an error if a file cannot be written.
pub async fn write_job_results(
    results_dir: &Path,
    job: &JobSpec,
    result: &ExecutionResult,
) -> EngineResult<()> {
    if matches!(job.kind, JobKind::Module(_)) {
        write(results_dir, STDOUT_FILE, result.stdout.as_bytes()).await?;
        write(results_dir, STDERR_FILE, result.stderr.as_bytes()).await?;
    }
    write(
        results_dir,
        EXIT_CODE_FILE,
        result.exit_code.to_string().as_bytes(),
    )
    .await?;
    debug!(
        job_id = %job.id,
        results_dir = %results_dir.display(),
        exit_code = result.exit_code,
        "Wrote job results"
    );
    Ok(())
}

async fn write(dir: &Path, name: &str, contents: &[u8]) -> EngineResult<()> {
    let path = dir.join(name);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| EngineError::WriteResult { path, source })
}
