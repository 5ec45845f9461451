//! Config file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge `/etc/shoal/config.toml`
//! 3. Merge the user file (`$SHOAL_HOME/config.toml`, else `~/.shoal/config.toml`)
//! 4. Merge the explicit file, if one was given (it must exist)
//! 5. Apply `SHOAL_*` fallbacks to fields no file set
//! 6. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// System-wide config file.
const SYSTEM_CONFIG: &str = "/etc/shoal/config.toml";

/// Maximum allowed config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Inputs to a layered load. Everything the loader would otherwise read from
/// the process is injectable here.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// File merged above the user layer. Unlike the discovered files it must
    /// exist.
    pub explicit: Option<PathBuf>,
    /// Directory holding the user `config.toml`. Bypasses `SHOAL_HOME` and
    /// home-directory discovery.
    pub home_override: Option<PathBuf>,
    /// Replaces `/etc/shoal/config.toml`.
    pub system_path: Option<PathBuf>,
    /// Replaces the process environment.
    pub env_vars: Option<HashMap<String, String>>,
}

/// Load the configuration with the full precedence chain.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file is unreadable, oversized or
/// malformed, or the merged configuration fails validation. File errors are
/// wrapped in [`ConfigError::Layer`] naming the layer that failed.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    let env_vars = options.env_vars.clone().unwrap_or_else(collect_env_vars);

    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", ConfigLayer::Defaults, &mut field_sources);

    let system_path = options
        .system_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG));
    let user_path = user_config_path(options.home_override.as_deref(), &env_vars)
        .map_err(|e| e.in_layer(ConfigLayer::User))?;

    let mut layers = vec![(system_path, ConfigLayer::System), (user_path, ConfigLayer::User)];
    if let Some(explicit) = &options.explicit {
        layers.push((explicit.clone(), ConfigLayer::Explicit));
    }

    for (path, layer) in layers {
        let overlay = if layer == ConfigLayer::Explicit {
            read_file(&path).map(Some)
        } else {
            try_load_file(&path)
        }
        .map_err(|e| e.in_layer(layer))?;
        if let Some(overlay) = overlay {
            deep_merge_tracking(&mut merged, &overlay, "", layer, &mut field_sources);
            info!(path = %path.display(), layer = %layer, "loaded config");
            loaded_files.push(path.display().to_string());
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from one file, with defaults for anything it omits.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = read_file(path)?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

fn user_config_path(
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<PathBuf> {
    if let Some(home) = home_override {
        return Ok(home.join("config.toml"));
    }
    if let Some(home) = env_vars.get("SHOAL_HOME").filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home).join("config.toml"));
    }
    Ok(home_directory()?.join(".shoal").join("config.toml"))
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

/// Read a file that may be absent. Missing files are skipped.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse(path, &content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            Ok(None)
        },
        Err(e) => Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(path, &content)
}

fn parse(path: &Path, content: &str) -> ConfigResult<toml::Value> {
    // Checked after reading so the size and the parsed bytes are the same file.
    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_default() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_try_load_file_missing() {
        assert!(
            try_load_file(Path::new("/nonexistent/config.toml"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let padding = "#".repeat(1_048_577);
        std::fs::write(&path, padding).unwrap();

        let result = try_load_file(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_user_path_prefers_shoal_home() {
        let mut env = HashMap::new();
        env.insert("SHOAL_HOME".to_owned(), "/opt/shoal".to_owned());
        assert_eq!(
            user_config_path(None, &env).unwrap(),
            PathBuf::from("/opt/shoal/config.toml")
        );
        assert_eq!(
            user_config_path(Some(Path::new("/override")), &env).unwrap(),
            PathBuf::from("/override/config.toml")
        );
    }
}
