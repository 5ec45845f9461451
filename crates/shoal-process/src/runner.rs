//! Subprocess execution with bounded output capture.
//!
//! Two forms are provided. [`ProcessRunner::run_process`] buffers everything
//! in memory and is meant for trusted internal commands.
//! [`ProcessRunner::run_process_to_disk`] streams each output pipe into a
//! size-capped backing file and returns only a bounded summary; use it for
//! untrusted job code.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use shoal_core::{EXIT_CODE_UNSET, ExecutionFailure, ExecutionResult, OutputLimits};
use tokio::fs::File;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::capture::{self, DrainLimits, DrainOutcome};
use crate::error::{ProcessError, ProcessResult, Stream};

/// How long drains may keep reading after a cancelled process is killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

type DrainHandle = JoinHandle<ProcessResult<(File, DrainOutcome)>>;

/// Runs subprocesses under a fixed set of output limits.
///
/// The limits are plain values owned by the runner, so runners with
/// different limits can be used concurrently.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    limits: OutputLimits,
}

impl ProcessRunner {
    /// Create a runner with the given limits.
    #[must_use]
    pub fn new(limits: OutputLimits) -> Self {
        Self { limits }
    }

    /// The limits used by [`ProcessRunner::run_process_to_disk`].
    #[must_use]
    pub fn limits(&self) -> &OutputLimits {
        &self.limits
    }

    /// Run a command and capture its complete output in memory.
    ///
    /// No truncation is applied. A non-zero exit is reported as a runtime
    /// failure while keeping the captured output and exit code.
    pub async fn run_process<S: AsRef<OsStr>>(
        &self,
        command: &str,
        args: &[S],
        cancel: Option<&CancellationToken>,
    ) -> ExecutionResult {
        debug!(command = %command, args = args.len(), "Running process in memory");

        let child = match job_command(command, args).spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = ProcessError::Spawn {
                    command: command.to_owned(),
                    source,
                };
                error!(error = %err, "Error starting command");
                return ExecutionResult::failed(err.into());
            },
        };

        // Dropping the output future drops the child, which kills it. The
        // rest of its process group is killed by pid.
        let pid = child.id();
        let output = match cancel {
            Some(token) => tokio::select! {
                output = child.wait_with_output() => output,
                () = token.cancelled() => {
                    warn!(command = %command, "Process cancelled");
                    kill_group(pid, command);
                    return ExecutionResult::failed(
                        ProcessError::Cancelled { command: command.to_owned() }.into(),
                    );
                },
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(source) => {
                return ExecutionResult::failed(
                    ProcessError::Wait {
                        command: command.to_owned(),
                        source,
                    }
                    .into(),
                );
            },
        };

        let exit_code = exit_code(output.status);
        let mut result = ExecutionResult::new()
            .with_output(
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            )
            .with_exit_code(exit_code);

        if !output.status.success() {
            warn!(command = %command, exit_code, "Command failed");
            result.failure = Some(
                ProcessError::NonZeroExit {
                    command: command.to_owned(),
                    code: exit_code,
                }
                .into(),
            );
        }
        result
    }

    /// Run a command, streaming its output into capped backing files.
    ///
    /// Uses the runner's own limits. See
    /// [`ProcessRunner::run_process_to_disk_with_limits`].
    pub async fn run_process_to_disk<S: AsRef<OsStr>>(
        &self,
        command: &str,
        args: &[S],
        stdout_path: &Path,
        stderr_path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> ExecutionResult {
        self.run_process_to_disk_with_limits(command, args, stdout_path, stderr_path, &self.limits, cancel)
            .await
    }

    /// Run a command, streaming its output into capped backing files, with
    /// limits supplied for this call only.
    ///
    /// Both backing files are created (truncating) before the process
    /// starts. Each pipe is drained by its own task; both tasks finish before
    /// the exit status is collected. The returned summaries hold at most the
    /// configured number of bytes from the start of each file, and a stream is
    /// flagged truncated when its file is longer than its summary cap.
    ///
    /// Exceeding a backing cap is not a failure. A nonzero exit is not a
    /// failure either; it is reported through `exit_code`.
    pub async fn run_process_to_disk_with_limits<S: AsRef<OsStr>>(
        &self,
        command: &str,
        args: &[S],
        stdout_path: &Path,
        stderr_path: &Path,
        limits: &OutputLimits,
        cancel: Option<&CancellationToken>,
    ) -> ExecutionResult {
        debug!(
            command = %command,
            args = args.len(),
            stdout = %stdout_path.display(),
            stderr = %stderr_path.display(),
            "Running process to disk"
        );

        match run_bounded(command, args, stdout_path, stderr_path, limits, cancel).await {
            Ok(result) => result,
            Err((err, exit_code)) => {
                error!(command = %command, error = %err, "Process run failed");
                ExecutionResult::failed(err.into()).with_exit_code(exit_code)
            },
        }
    }
}

async fn create_backing(stream: Stream, path: &Path) -> ProcessResult<File> {
    File::create(path)
        .await
        .map_err(|source| ProcessError::BackingFile {
            stream,
            path: path.to_path_buf(),
            source,
        })
}

fn spawn_drain<R>(
    stream: Stream,
    pipe: Option<R>,
    file: File,
    backing_max_bytes: u64,
    read_chunk_bytes: usize,
) -> DrainHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let limits = DrainLimits {
        backing_max_bytes,
        read_chunk_bytes,
    };
    let sentinel = OutputLimits::sentinel(backing_max_bytes);
    tokio::spawn(async move {
        match pipe {
            Some(pipe) => capture::drain(stream, pipe, file, limits, sentinel).await,
            None => Ok((file, DrainOutcome::default())),
        }
    })
}

type Joined = Result<ProcessResult<(File, DrainOutcome)>, tokio::task::JoinError>;

/// Sync then close both backing files.
///
/// Runs for both streams even if one fails, so neither file is left open.
async fn close_backing(out: Joined, err: Joined) -> ProcessResult<()> {
    let out = settle(Stream::Stdout, out).await;
    let err = settle(Stream::Stderr, err).await;
    out.and(err)
}

async fn settle(stream: Stream, joined: Joined) -> ProcessResult<()> {
    let (file, outcome) = joined.map_err(|e| ProcessError::Drain {
        stream,
        message: e.to_string(),
    })??;

    if let Some(read_error) = &outcome.read_error {
        warn!(stream = %stream, error = %read_error, "Pipe read error; keeping captured output");
    }
    if let Err(e) = file.sync_all().await {
        error!(stream = %stream, error = %e, "Error syncing backing file");
    }
    drop(file);
    Ok(())
}

async fn wait_child(
    child: &mut Child,
    command: &str,
    cancel: Option<&CancellationToken>,
) -> ProcessResult<(ExitStatus, bool)> {
    let wait_err = |source| ProcessError::Wait {
        command: command.to_owned(),
        source,
    };
    match cancel {
        Some(token) if !token.is_cancelled() => tokio::select! {
            status = child.wait() => Ok((status.map_err(wait_err)?, false)),
            () = token.cancelled() => {
                kill(child, command);
                Ok((child.wait().await.map_err(wait_err)?, true))
            },
        },
        Some(_) => {
            kill(child, command);
            Ok((child.wait().await.map_err(wait_err)?, true))
        },
        None => Ok((child.wait().await.map_err(wait_err)?, false)),
    }
}

fn kill(child: &mut Child, command: &str) {
    warn!(command = %command, "Process cancelled, killing");
    kill_group(child.id(), command);
    if let Err(e) = child.start_kill() {
        debug!(command = %command, error = %e, "Kill failed, process likely already exited");
    }
}

/// SIGKILL the process group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>, command: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(command = %command, pid, error = %e, "Process group kill failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>, _command: &str) {}

/// A piped, stdin-less command. On Unix the child leads its own process
/// group so cancellation reaches everything it forks.
fn job_command<S: AsRef<OsStr>>(command: &str, args: &[S]) -> Command {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

async fn run_bounded<S: AsRef<OsStr>>(
    command: &str,
    args: &[S],
    stdout_path: &Path,
    stderr_path: &Path,
    limits: &OutputLimits,
    cancel: Option<&CancellationToken>,
) -> Result<ExecutionResult, (ProcessError, i32)> {
    let unset = |e| (e, EXIT_CODE_UNSET);

    let stdout_file = create_backing(Stream::Stdout, stdout_path).await.map_err(unset)?;
    let stderr_file = create_backing(Stream::Stderr, stderr_path).await.map_err(unset)?;

    let mut child = job_command(command, args)
        .spawn()
        .map_err(|source| {
            unset(ProcessError::Spawn {
                command: command.to_owned(),
                source,
            })
        })?;

    let out = spawn_drain(
        Stream::Stdout,
        child.stdout.take(),
        stdout_file,
        limits.stdout_backing_max_bytes,
        limits.read_chunk_bytes,
    );
    let err = spawn_drain(
        Stream::Stderr,
        child.stderr.take(),
        stderr_file,
        limits.stderr_backing_max_bytes,
        limits.read_chunk_bytes,
    );

    // Drains first, then wait: a child blocked on a full pipe never
    // deadlocks against us. Cancellation kills the child's process group so
    // the drains see end-of-stream; a descendant that left the group can
    // still hold a pipe open, so the drains get a bounded grace period.
    let aborts = [out.abort_handle(), err.abort_handle()];
    let mut drains = std::pin::pin!(async { tokio::join!(out, err) });
    let joined = match cancel {
        Some(token) => tokio::select! {
            joined = &mut drains => Some(joined),
            () = token.cancelled() => {
                kill(&mut child, command);
                match tokio::time::timeout(DRAIN_GRACE, &mut drains).await {
                    Ok(joined) => Some(joined),
                    Err(_) => {
                        warn!(
                            command = %command,
                            grace = ?DRAIN_GRACE,
                            "Output pipes still open after kill, abandoning drains"
                        );
                        for handle in &aborts {
                            handle.abort();
                        }
                        None
                    },
                }
            },
        },
        None => Some(drains.await),
    };

    let (status, cancelled) = wait_child(&mut child, command, cancel).await.map_err(unset)?;
    let exit_code = exit_code(status);
    if let Some((out, err)) = joined {
        close_backing(out, err).await.map_err(|e| (e, exit_code))?;
    }

    let out = capture::summarize(Stream::Stdout, stdout_path, limits.stdout_summary_max_bytes)
        .await
        .map_err(|e| (e, exit_code))?;
    let err = capture::summarize(Stream::Stderr, stderr_path, limits.stderr_summary_max_bytes)
        .await
        .map_err(|e| (e, exit_code))?;

    let mut result = ExecutionResult::new()
        .with_output(out.text, err.text)
        .with_exit_code(exit_code);
    result.stdout_truncated = out.truncated;
    result.stderr_truncated = err.truncated;
    if cancelled {
        result.failure = Some(ExecutionFailure::from(ProcessError::Cancelled {
            command: command.to_owned(),
        }));
    }

    debug!(
        command = %command,
        exit_code,
        stdout_truncated = result.stdout_truncated,
        stderr_truncated = result.stderr_truncated,
        "Process finished"
    );
    Ok(result)
}

/// Exit code of a finished process; [`EXIT_CODE_UNSET`] if it was killed by
/// a signal.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(EXIT_CODE_UNSET)
}
