//! Volume specifications and storage locators.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Opaque reference to stored content, resolved by a
/// [`StorageResolver`](crate::StorageResolver).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageLocator(String);

impl StorageLocator {
    /// Create a locator from its string form.
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Create a `file://` locator for a local path.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(format!("file://{}", path.as_ref().display()))
    }

    /// The raw locator string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL scheme, if the locator has one (`file`, `ipfs`, ...).
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }

    /// A short human name derived from the last path segment, without
    /// extension. Used as a fallback module name.
    #[must_use]
    pub fn stem(&self) -> &str {
        let without_scheme = self.0.split_once("://").map_or(self.0.as_str(), |(_, rest)| rest);
        let last = without_scheme
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(without_scheme);
        last.split_once('.').map_or(last, |(stem, _)| stem)
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageLocator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A named, path-mounted data source (input) or destination (output).
///
/// Inputs carry a `source`; outputs carry only `name` and `mount_path` until
/// the job writes content under them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Volume name. For outputs this names the results subdirectory.
    pub name: String,
    /// Path at which the volume appears inside the job's filesystem.
    pub mount_path: String,
    /// Where the content lives, for inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<StorageLocator>,
}

impl VolumeSpec {
    /// Create an input volume.
    #[must_use]
    pub fn input(
        name: impl Into<String>,
        mount_path: impl Into<String>,
        source: impl Into<StorageLocator>,
    ) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            source: Some(source.into()),
        }
    }

    /// Create an output volume.
    #[must_use]
    pub fn output(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            source: None,
        }
    }
}

/// An input volume whose source has been resolved to a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedVolume {
    /// The volume as declared by the job.
    pub spec: VolumeSpec,
    /// Local path holding the content. May be a directory or a single file.
    pub local_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme() {
        assert_eq!(StorageLocator::new("file:///data/in").scheme(), Some("file"));
        assert_eq!(StorageLocator::new("ipfs://bafy").scheme(), Some("ipfs"));
        assert_eq!(StorageLocator::new("/data/in").scheme(), None);
    }

    #[test]
    fn test_stem() {
        assert_eq!(StorageLocator::new("file:///mods/echo.wasm").stem(), "echo");
        assert_eq!(StorageLocator::new("lib/math.wasm").stem(), "math");
        assert_eq!(StorageLocator::new("ipfs://bafyabc/").stem(), "bafyabc");
        assert_eq!(StorageLocator::new("plain").stem(), "plain");
    }

    #[test]
    fn test_from_path() {
        let locator = StorageLocator::from_path("/tmp/x.wasm");
        assert_eq!(locator.as_str(), "file:///tmp/x.wasm");
    }

    #[test]
    fn test_volume_constructors() {
        let input = VolumeSpec::input("data", "/inputs", "file:///srv/data");
        assert!(input.source.is_some());
        let output = VolumeSpec::output("outputs", "/outputs");
        assert!(output.source.is_none());

        let json = serde_json::to_string(&output).unwrap();
        assert!(!json.contains("source"));
    }
}
