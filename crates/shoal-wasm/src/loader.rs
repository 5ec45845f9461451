//! Fetching module bytes from storage.

use std::path::{Path, PathBuf};

use shoal_core::{StorageLocator, StorageResolver};
use tracing::debug;

use crate::error::LoadError;

/// Raw bytes of a module, not yet compiled.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// Where the module came from.
    pub locator: StorageLocator,
    /// Local file the bytes were read from.
    pub path: PathBuf,
    /// Module bytes.
    pub bytes: Vec<u8>,
    /// Name to use if the module carries none.
    pub fallback_name: String,
}

/// Resolve `locator` and read the module it points at.
///
/// A locator that resolves to a directory must contain exactly one `.wasm`
/// file.
///
/// # Errors
///
/// Fails if the locator cannot be resolved, the directory is empty or
/// ambiguous, or the file cannot be read.
pub async fn load_module(
    storage: &dyn StorageResolver,
    locator: &StorageLocator,
) -> Result<ModuleSource, LoadError> {
    let resolved = storage.resolve(locator).await?;
    let path = if tokio::fs::metadata(&resolved)
        .await
        .map_err(|source| LoadError::Read {
            path: resolved.clone(),
            source,
        })?
        .is_dir()
    {
        find_single_module(&resolved).await?
    } else {
        resolved
    };

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;

    let fallback_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| locator.stem().to_owned());

    debug!(
        locator = %locator,
        path = %path.display(),
        size = bytes.len(),
        "Loaded module bytes"
    );
    Ok(ModuleSource {
        locator: locator.clone(),
        path,
        bytes,
        fallback_name,
    })
}

/// Load the entry module and every import module, imports in declared
/// order. Nothing is returned unless every module loads.
///
/// # Errors
///
/// Returns the first load failure.
pub async fn load_all(
    storage: &dyn StorageResolver,
    entry: &StorageLocator,
    imports: &[StorageLocator],
) -> Result<(ModuleSource, Vec<ModuleSource>), LoadError> {
    let entry = load_module(storage, entry).await?;
    let mut loaded = Vec::with_capacity(imports.len());
    for locator in imports {
        loaded.push(load_module(storage, locator).await?);
    }
    Ok((entry, loaded))
}

async fn find_single_module(dir: &Path) -> Result<PathBuf, LoadError> {
    let read_err = |source| LoadError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let is_wasm = path.extension().is_some_and(|ext| ext == "wasm");
        if is_wasm && entry.file_type().await.map_err(read_err)?.is_file() {
            found.push(path);
        }
    }

    match found.len() {
        0 => Err(LoadError::NoModuleInDirectory(dir.to_path_buf())),
        1 => Ok(found.remove(0)),
        count => Err(LoadError::AmbiguousDirectory {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::{LocalStorage, StorageError};

    #[tokio::test]
    async fn test_load_file_and_single_module_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("echo.wasm"), b"\0asm").unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/main.wasm"), b"bytes").unwrap();
        std::fs::write(dir.path().join("pkg/README"), b"docs").unwrap();
        let storage = LocalStorage::with_root(dir.path());

        let file = load_module(&storage, &StorageLocator::new("echo.wasm"))
            .await
            .unwrap();
        assert_eq!(file.bytes, b"\0asm");
        assert_eq!(file.fallback_name, "echo");

        let packaged = load_module(&storage, &StorageLocator::new("pkg"))
            .await
            .unwrap();
        assert_eq!(packaged.bytes, b"bytes");
        assert_eq!(packaged.fallback_name, "main");
    }

    #[tokio::test]
    async fn test_directory_must_hold_exactly_one_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::create_dir(dir.path().join("two")).unwrap();
        std::fs::write(dir.path().join("two/a.wasm"), b"a").unwrap();
        std::fs::write(dir.path().join("two/b.wasm"), b"b").unwrap();
        let storage = LocalStorage::with_root(dir.path());

        assert!(matches!(
            load_module(&storage, &StorageLocator::new("empty")).await,
            Err(LoadError::NoModuleInDirectory(_))
        ));
        assert!(matches!(
            load_module(&storage, &StorageLocator::new("two")).await,
            Err(LoadError::AmbiguousDirectory { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.wasm"), b"m").unwrap();
        std::fs::write(dir.path().join("lib.wasm"), b"l").unwrap();
        let storage = LocalStorage::with_root(dir.path());

        let (entry, imports) = load_all(
            &storage,
            &StorageLocator::new("main.wasm"),
            &[StorageLocator::new("lib.wasm")],
        )
        .await
        .unwrap();
        assert_eq!(entry.fallback_name, "main");
        assert_eq!(imports.len(), 1);

        let err = load_all(
            &storage,
            &StorageLocator::new("main.wasm"),
            &[
                StorageLocator::new("lib.wasm"),
                StorageLocator::new("gone.wasm"),
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoadError::Storage(StorageError::NotFound(_))));
    }
}
