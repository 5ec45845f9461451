//! Bridge from `shoal_config::Config` to domain types.

use std::time::Duration;

use shoal_config::Config;
use shoal_core::{LocalStorage, OutputLimits};
use shoal_telemetry::{LogConfig, LogFormat};
use shoal_wasm::WasmtimeEngineFactory;

fn to_usize(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

/// Convert the `[executor]` section to runner limits.
#[must_use]
pub fn to_output_limits(cfg: &Config) -> OutputLimits {
    let e = &cfg.executor;
    OutputLimits {
        stdout_backing_max_bytes: e.stdout_backing_max_bytes,
        stderr_backing_max_bytes: e.stderr_backing_max_bytes,
        stdout_summary_max_bytes: to_usize(e.stdout_summary_max_bytes),
        stderr_summary_max_bytes: to_usize(e.stderr_summary_max_bytes),
        read_chunk_bytes: to_usize(e.read_chunk_bytes),
    }
}

/// The timeout applied to jobs that set none. `0` disables it.
#[must_use]
pub fn to_default_timeout(cfg: &Config) -> Option<Duration> {
    match cfg.executor.job_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

/// Convert the `[logging]` section to a [`LogConfig`].
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse()
        .unwrap_or(LogFormat::Compact);

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);
    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    log_config
}

/// Local storage rooted at `[storage].root`, if set.
#[must_use]
pub fn to_storage(cfg: &Config) -> LocalStorage {
    match &cfg.storage.root {
        Some(root) => LocalStorage::with_root(root),
        None => LocalStorage::new(),
    }
}

/// The wasmtime backend with the configured stdio cap.
#[must_use]
pub fn to_engine_factory(cfg: &Config) -> WasmtimeEngineFactory {
    WasmtimeEngineFactory::new().with_max_output_bytes(to_usize(cfg.wasm.max_captured_output_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_default_limits() {
        assert_eq!(to_output_limits(&Config::default()), OutputLimits::default());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let mut cfg = Config::default();
        assert_eq!(to_default_timeout(&cfg), None);
        cfg.executor.job_timeout_secs = 30;
        assert_eq!(to_default_timeout(&cfg), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_log_config_carries_format_and_directives() {
        let mut cfg = Config::default();
        cfg.logging.level = "debug".to_owned();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["shoal_vfs=trace".to_owned()];

        let log = to_log_config(&cfg);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["shoal_vfs=trace"]);
    }
}
