//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Log levels accepted by `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Formats accepted by `logging.format`.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_executor(config)?;
    validate_wasm(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message,
    }
}

fn validate_executor(config: &Config) -> ConfigResult<()> {
    let e = &config.executor;

    if e.read_chunk_bytes == 0 {
        return Err(invalid(
            "executor.read_chunk_bytes",
            "read chunk size must be greater than zero".to_owned(),
        ));
    }

    if e.stdout_summary_max_bytes > e.stdout_backing_max_bytes {
        return Err(invalid(
            "executor.stdout_summary_max_bytes",
            format!(
                "summary cap {} exceeds the backing file cap {}",
                e.stdout_summary_max_bytes, e.stdout_backing_max_bytes
            ),
        ));
    }

    if e.stderr_summary_max_bytes > e.stderr_backing_max_bytes {
        return Err(invalid(
            "executor.stderr_summary_max_bytes",
            format!(
                "summary cap {} exceeds the backing file cap {}",
                e.stderr_summary_max_bytes, e.stderr_backing_max_bytes
            ),
        ));
    }

    Ok(())
}

fn validate_wasm(config: &Config) -> ConfigResult<()> {
    if config.wasm.default_entry_point.trim().is_empty() {
        return Err(invalid(
            "wasm.default_entry_point",
            "entry point must not be empty".to_owned(),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let mut config = Config::default();
        config.executor.read_chunk_bytes = 0;
        assert_eq!(field_of(validate(&config)), "executor.read_chunk_bytes");
    }

    #[test]
    fn test_summary_above_backing_rejected() {
        let mut config = Config::default();
        config.executor.stderr_backing_max_bytes = 100;
        config.executor.stderr_summary_max_bytes = 101;
        assert_eq!(
            field_of(validate(&config)),
            "executor.stderr_summary_max_bytes"
        );

        config.executor.stderr_summary_max_bytes = 100;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_level_and_format_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");

        config.logging.level = "DEBUG".to_owned();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }
}
