//! Mock collaborators for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shoal_core::{StorageError, StorageLocator, StorageResolver, StorageResult};

/// A [`StorageResolver`] backed by a fixed locator-to-path table.
///
/// Counts every resolution so tests can assert how often storage was hit.
#[derive(Debug, Clone, Default)]
pub struct StaticStorage {
    entries: Arc<Mutex<HashMap<StorageLocator, PathBuf>>>,
    resolves: Arc<AtomicUsize>,
}

impl StaticStorage {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a locator to a local path.
    #[must_use]
    pub fn with_entry(self, locator: impl Into<StorageLocator>, path: impl AsRef<Path>) -> Self {
        self.insert(locator, path);
        self
    }

    /// Map a locator to a local path through a shared handle.
    pub fn insert(&self, locator: impl Into<StorageLocator>, path: impl AsRef<Path>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(locator.into(), path.as_ref().to_path_buf());
        }
    }

    /// Number of `resolve` calls made so far, including failed ones.
    #[must_use]
    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageResolver for StaticStorage {
    async fn resolve(&self, locator: &StorageLocator) -> StorageResult<PathBuf> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::NotFound(locator.to_string()))?;
        entries
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }

    async fn volume_size(&self, locator: &StorageLocator) -> StorageResult<u64> {
        let path = self.resolve(locator).await?;
        Ok(std::fs::metadata(path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_storage_counts_resolves() {
        let storage = StaticStorage::new().with_entry("ipfs://a", "/tmp/a");
        assert_eq!(
            storage.resolve(&"ipfs://a".into()).await.unwrap(),
            PathBuf::from("/tmp/a")
        );
        assert!(storage.resolve(&"ipfs://b".into()).await.is_err());
        assert_eq!(storage.resolve_count(), 2);
    }
}
