//! Configuration struct definitions.
//!
//! Every section uses `#[serde(default)]` so a file only needs to name the
//! fields it changes.

use serde::{Deserialize, Serialize};

/// 1 GiB, the default cap for backing files and captured module output.
const GIB: u64 = 1024 * 1024 * 1024;

/// Fully resolved shoal configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output limits and timeouts for job execution.
    pub executor: ExecutorSection,
    /// Module executor settings.
    pub wasm: WasmSection,
    /// Where locators are resolved.
    pub storage: StorageSection,
    /// Log filtering and formatting.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// ExecutorSection
// ---------------------------------------------------------------------------

/// Caps applied while capturing process output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// Largest stdout backing file before truncation.
    pub stdout_backing_max_bytes: u64,
    /// Largest stderr backing file before truncation.
    pub stderr_backing_max_bytes: u64,
    /// Bytes of stdout returned inline in a result.
    pub stdout_summary_max_bytes: u64,
    /// Bytes of stderr returned inline in a result.
    pub stderr_summary_max_bytes: u64,
    /// Pipe read size.
    pub read_chunk_bytes: u64,
    /// Wall-clock limit for jobs that set none. `0` means no limit.
    pub job_timeout_secs: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            stdout_backing_max_bytes: GIB,
            stderr_backing_max_bytes: GIB,
            stdout_summary_max_bytes: 2048,
            stderr_summary_max_bytes: 2048,
            read_chunk_bytes: 1024,
            job_timeout_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// WasmSection
// ---------------------------------------------------------------------------

/// Module executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmSection {
    /// Export called when a job names no entry point.
    pub default_entry_point: String,
    /// Cap on stdout and stderr each module may buffer in memory.
    pub max_captured_output_bytes: u64,
}

impl Default for WasmSection {
    fn default() -> Self {
        Self {
            default_entry_point: "_start".to_owned(),
            max_captured_output_bytes: GIB,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// Local storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Base directory for relative locators. `None` resolves them against
    /// the working directory.
    pub root: Option<String>,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate directives such as `"shoal_wasm=debug"`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
