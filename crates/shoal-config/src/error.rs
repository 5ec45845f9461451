use std::io;

use thiserror::Error;

use crate::merge::ConfigLayer;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// Path of the unreadable file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config file, or the merged tree, is not valid TOML for [`Config`](crate::Config).
    #[error("Failed to parse config file at {path}: {source}")]
    ParseError {
        /// Path of the offending file, or a `<...>` marker for in-memory trees.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent with another value.
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The user's home directory could not be determined.
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Loading one layer's file failed.
    #[error("{layer} config: {source}")]
    Layer {
        /// The layer whose file failed.
        layer: ConfigLayer,
        /// Why it failed.
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Attribute this error to `layer`.
    #[must_use]
    pub fn in_layer(self, layer: ConfigLayer) -> Self {
        Self::Layer {
            layer,
            source: Box::new(self),
        }
    }

    /// The layer whose file caused the error, if it came from a file layer.
    #[must_use]
    pub fn layer(&self) -> Option<ConfigLayer> {
        match self {
            Self::Layer { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
