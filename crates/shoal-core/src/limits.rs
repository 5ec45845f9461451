//! Output bounds for subprocess execution.
//!
//! These are explicit values handed to each run, so concurrent jobs with
//! different bounds never interfere with one another.

use serde::{Deserialize, Serialize};

use crate::size::ByteSize;

/// Default cap for each on-disk backing file (1 GiB).
pub const DEFAULT_BACKING_MAX_BYTES: u64 = ByteSize::GIB.as_u64();
/// Default cap for each in-memory summary.
pub const DEFAULT_SUMMARY_MAX_BYTES: usize = 2048;
/// Default size of a single pipe read.
pub const DEFAULT_READ_CHUNK_BYTES: usize = 1024;

/// Size caps for the bounded output capture runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLimits {
    /// Cap on the stdout backing file.
    pub stdout_backing_max_bytes: u64,
    /// Cap on the stderr backing file.
    pub stderr_backing_max_bytes: u64,
    /// Cap on the stdout summary returned in memory.
    pub stdout_summary_max_bytes: usize,
    /// Cap on the stderr summary returned in memory.
    pub stderr_summary_max_bytes: usize,
    /// Size of each read from a pipe.
    pub read_chunk_bytes: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            stdout_backing_max_bytes: DEFAULT_BACKING_MAX_BYTES,
            stderr_backing_max_bytes: DEFAULT_BACKING_MAX_BYTES,
            stdout_summary_max_bytes: DEFAULT_SUMMARY_MAX_BYTES,
            stderr_summary_max_bytes: DEFAULT_SUMMARY_MAX_BYTES,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

impl OutputLimits {
    /// Create limits with the process-wide defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing file cap for both streams.
    #[must_use]
    pub fn with_backing_max(mut self, bytes: u64) -> Self {
        self.stdout_backing_max_bytes = bytes;
        self.stderr_backing_max_bytes = bytes;
        self
    }

    /// Set the summary cap for both streams.
    #[must_use]
    pub fn with_summary_max(mut self, bytes: usize) -> Self {
        self.stdout_summary_max_bytes = bytes;
        self.stderr_summary_max_bytes = bytes;
        self
    }

    /// Set the pipe read chunk size.
    #[must_use]
    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk_bytes = bytes;
        self
    }

    /// The message appended to a backing file whose cap was exceeded.
    ///
    /// The cap is rendered in gibibytes; caps that are not a whole number of
    /// gibibytes render as a decimal fraction.
    #[must_use]
    pub fn sentinel(backing_max_bytes: u64) -> String {
        let gib = ByteSize::GIB.as_u64();
        let rendered = if backing_max_bytes % gib == 0 {
            (backing_max_bytes / gib).to_string()
        } else {
            #[allow(clippy::cast_precision_loss)]
            let fraction = backing_max_bytes as f64 / gib as f64;
            fraction.to_string()
        };
        format!("FILE EXCEEDED MAXIMUM SIZE ({rendered} GB). STOPPING.")
    }
}
