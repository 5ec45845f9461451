//! Source-annotated rendering for `shoal config show`.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration with the layer behind each value.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Files that were loaded, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    /// TOML with a trailing comment naming each value's layer.
    #[default]
    Toml,
    /// Plain JSON.
    Json,
}

impl ResolvedConfig {
    /// Render the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn show(&self, format: ShowFormat) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(),
            ShowFormat::Json => serde_json::to_string_pretty(&self.config).map_err(|_| fmt::Error),
        }
    }

    fn show_toml(&self) -> Result<String, fmt::Error> {
        let body = toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?;

        let mut output = String::from("# Resolved shoal configuration\n");
        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files (lowest precedence first):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                writeln!(output, "#   {}. {path}", i.saturating_add(1))?;
            }
        }
        output.push('\n');

        let mut section = String::new();
        for line in body.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                name.clone_into(&mut section);
            }
            match annotate(trimmed, &section, &self.field_sources) {
                Some(layer) => writeln!(output, "{line}  # [{layer}]")?,
                None => writeln!(output, "{line}")?,
            }
        }
        Ok(output)
    }
}

fn annotate(line: &str, section: &str, sources: &FieldSources) -> Option<String> {
    let (key, _) = line.split_once('=')?;
    let key = key.trim();
    let path = if section.is_empty() {
        key.to_owned()
    } else {
        format!("{section}.{key}")
    };
    sources.get(&path).map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("logging.level".to_owned(), ConfigLayer::Environment);
        field_sources.insert("executor.read_chunk_bytes".to_owned(), ConfigLayer::Defaults);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/etc/shoal/config.toml".to_owned()],
        }
    }

    #[test]
    fn test_toml_is_annotated() {
        let out = resolved().show(ShowFormat::Toml).unwrap();
        assert!(out.contains("#   1. /etc/shoal/config.toml"));
        assert!(out.contains("level = \"info\"  # [env]"), "{out}");
        assert!(out.contains("read_chunk_bytes = 1024  # [defaults]"), "{out}");
    }

    #[test]
    fn test_json_round_trips() {
        let out = resolved().show(ShowFormat::Json).unwrap();
        let back: Config = serde_json::from_str(&out).unwrap();
        assert_eq!(back, Config::default());
    }
}
