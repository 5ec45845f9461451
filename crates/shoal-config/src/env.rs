//! Environment variable fallbacks.
//!
//! Environment variables fill in fields no config file set; they never
//! override a file.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "SHOAL_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "SHOAL_LOG_FORMAT",
        field_path: "logging.format",
    },
    EnvMapping {
        var_name: "SHOAL_STORAGE_ROOT",
        field_path: "storage.root",
    },
    EnvMapping {
        var_name: "SHOAL_JOB_TIMEOUT_SECS",
        field_path: "executor.job_timeout_secs",
    },
];

/// Fields stored as integers; their variables are parsed before insertion.
const INTEGER_FIELDS: &[&str] = &["executor.job_timeout_secs"];

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Apply `SHOAL_*` fallbacks to fields that no file layer set.
///
/// A field counts as set when its recorded layer is anything but
/// [`ConfigLayer::Defaults`]. Returns the number of variables applied.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied: usize = 0;
    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "config file already sets field, ignoring env var"
            );
            continue;
        }

        set_field(merged, mapping.field_path, coerce(mapping.field_path, raw));
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        applied = applied.saturating_add(1);
    }
    applied
}

/// Integer fields become TOML integers when they parse; anything else stays a
/// string so deserialization reports the bad value against its field.
fn coerce(path: &str, raw: &str) -> toml::Value {
    if INTEGER_FIELDS.contains(&path) {
        if let Ok(n) = raw.trim().parse::<i64>() {
            return toml::Value::Integer(n);
        }
    }
    toml::Value::String(raw.to_owned())
}

fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        if !table.contains_key(segment) {
            table.insert(
                segment.to_owned(),
                toml::Value::Table(toml::map::Map::new()),
            );
        }
        current = match table.get_mut(segment) {
            Some(next) => next,
            None => return,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::record_leaves;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_fills_default_fields() {
        let mut merged: toml::Value = toml::from_str(
            r#"
            [executor]
            job_timeout_secs = 0
            [logging]
            level = "info"
        "#,
        )
        .unwrap();
        let mut sources = FieldSources::new();
        record_leaves(&merged, "", ConfigLayer::Defaults, &mut sources);

        let applied = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &env(&[
                ("SHOAL_LOG_LEVEL", "debug"),
                ("SHOAL_JOB_TIMEOUT_SECS", "90"),
                ("SHOAL_STORAGE_ROOT", "/srv/inputs"),
            ]),
        );

        assert_eq!(applied, 3);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(merged["executor"]["job_timeout_secs"].as_integer(), Some(90));
        assert_eq!(merged["storage"]["root"].as_str(), Some("/srv/inputs"));
        assert_eq!(
            sources.get("storage.root"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_does_not_override_files() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);

        let applied = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &env(&[("SHOAL_LOG_LEVEL", "trace")]),
        );

        assert_eq!(applied, 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_unparseable_integer_stays_string() {
        assert_eq!(
            coerce("executor.job_timeout_secs", "soon"),
            toml::Value::String("soon".to_owned())
        );
        assert_eq!(coerce("logging.level", "5"), toml::Value::String("5".to_owned()));
    }
}
