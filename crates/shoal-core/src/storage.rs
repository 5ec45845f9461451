//! Storage collaborator interface.
//!
//! The execution engine only knows "local path for a named volume". Fetching
//! content-addressed data is the job of whatever implements
//! [`StorageResolver`]; [`LocalStorage`] covers content already on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::volume::{PreparedVolume, StorageLocator, VolumeSpec};

/// Resolves storage locators to local filesystem paths.
///
/// Implementations must be safe to call concurrently from independent job
/// executions; the engine adds no locking of its own.
#[async_trait]
pub trait StorageResolver: Send + Sync {
    /// Resolve a locator to a local path. The path may name a directory or a
    /// single file.
    async fn resolve(&self, locator: &StorageLocator) -> StorageResult<PathBuf>;

    /// Size in bytes of the content behind a locator.
    async fn volume_size(&self, locator: &StorageLocator) -> StorageResult<u64>;

    /// Resolve every volume, concurrently, preserving declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingSource`] for a volume without a source,
    /// or the first resolution error encountered.
    async fn prepare_all(&self, specs: &[VolumeSpec]) -> StorageResult<Vec<PreparedVolume>> {
        let futures = specs.iter().map(|spec| async move {
            let source = spec.source.as_ref().ok_or_else(|| StorageError::MissingSource {
                name: spec.name.clone(),
            })?;
            let local_path = self.resolve(source).await?;
            Ok::<_, StorageError>(PreparedVolume {
                spec: spec.clone(),
                local_path,
            })
        });
        try_join_all(futures).await
    }
}

/// Resolver for content already present on the local filesystem.
///
/// Understands `file://` locators and bare paths. Relative paths are joined
/// onto the configured root, or the current directory if there is none.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    root: Option<PathBuf>,
}

impl LocalStorage {
    /// Create a resolver for absolute locators and paths relative to the
    /// current directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver that joins relative locators onto `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn local_path(&self, locator: &StorageLocator) -> StorageResult<PathBuf> {
        let raw = match locator.scheme() {
            None => locator.as_str(),
            Some("file") => locator
                .as_str()
                .strip_prefix("file://")
                .unwrap_or(locator.as_str()),
            Some(_) => return Err(StorageError::UnsupportedLocator(locator.to_string())),
        };

        let path = Path::new(raw);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(match &self.root {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        })
    }
}

#[async_trait]
impl StorageResolver for LocalStorage {
    async fn resolve(&self, locator: &StorageLocator) -> StorageResult<PathBuf> {
        let path = self.local_path(locator)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        debug!(locator = %locator, path = %path.display(), "resolved local storage");
        Ok(path)
    }

    async fn volume_size(&self, locator: &StorageLocator) -> StorageResult<u64> {
        let path = self.resolve(locator).await?;
        tokio::task::spawn_blocking(move || directory_size(&path))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }
}

fn directory_size(path: &Path) -> StorageResult<u64> {
    let mut total: u64 = 0;
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
        if entry.file_type().is_file() {
            let len = entry.metadata().map_err(|e| StorageError::Io(std::io::Error::other(e)))?.len();
            total = total.saturating_add(len);
        }
    }
    Ok(total)
}
