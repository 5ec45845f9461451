use std::path::Path;

use shoal_core::{PreparedVolume, StorageResolver, VolumeSpec};
use tracing::{debug, info};

use crate::path::is_single_component;
use crate::{MountAccess, MountFs, MountInfo, MountKind, VfsError, VfsResult};

/// Build the job filesystem from declared volumes.
///
/// Inputs are resolved through `storage` and mounted read-only: directories
/// as-is, single files as a one-entry directory named after the file. Each output gets a fresh
/// directory `results_dir/<name>` mounted write-capable at its mount path.
///
/// # Errors
///
/// Fails on storage errors, malformed volumes, existing output directories,
/// and duplicate or overlapping mount paths. Output directories created
/// before the failure are left in place.
pub async fn compose(
    results_dir: &Path,
    inputs: &[VolumeSpec],
    outputs: &[VolumeSpec],
    storage: &dyn StorageResolver,
) -> VfsResult<MountFs> {
    let prepared = storage.prepare_all(inputs).await?;
    compose_prepared(results_dir, &prepared, outputs).await
}

/// Build the job filesystem from inputs that are already resolved.
///
/// # Errors
///
/// Same as [`compose`], minus storage errors.
pub async fn compose_prepared(
    results_dir: &Path,
    inputs: &[PreparedVolume],
    outputs: &[VolumeSpec],
) -> VfsResult<MountFs> {
    let mut fs = MountFs::new();

    for input in inputs {
        let metadata = tokio::fs::metadata(&input.local_path).await?;
        let kind = if metadata.is_dir() {
            MountKind::Directory
        } else {
            if input.local_path.file_name().is_none() {
                return Err(VfsError::InvalidVolume {
                    name: input.spec.name.clone(),
                    reason: format!("{} has no file name", input.local_path.display()),
                });
            }
            MountKind::File
        };
        fs.mount(MountInfo {
            guest_path: input.spec.mount_path.clone(),
            host_path: input.local_path.clone(),
            access: MountAccess::ReadOnly,
            kind,
        })?;
    }

    for output in outputs {
        validate_output(output)?;
        let host_path = results_dir.join(&output.name);
        create_output_dir(&host_path).await?;
        fs.mount(MountInfo {
            guest_path: output.mount_path.clone(),
            host_path,
            access: MountAccess::ReadWrite,
            kind: MountKind::Output,
        })?;
    }

    info!(
        results_dir = %results_dir.display(),
        inputs = inputs.len(),
        outputs = outputs.len(),
        "Composed job filesystem"
    );
    Ok(fs)
}

fn validate_output(output: &VolumeSpec) -> VfsResult<()> {
    let invalid = |reason: &str| VfsError::InvalidVolume {
        name: output.name.clone(),
        reason: reason.to_owned(),
    };
    if output.name.is_empty() {
        return Err(invalid("output name is empty"));
    }
    if output.mount_path.is_empty() {
        return Err(invalid("output mount path is empty"));
    }
    if !is_single_component(&output.name) {
        return Err(invalid("output name must be a single path component"));
    }
    Ok(())
}

async fn create_output_dir(path: &Path) -> VfsResult<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(0o755);
    match builder.create(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Created output directory");
            Ok(())
        },
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(VfsError::OutputExists(path.to_path_buf()))
        },
        Err(e) => Err(VfsError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_name_validation() {
        let results = tempfile::tempdir().unwrap();
        for bad in [
            VolumeSpec::output("", "/out"),
            VolumeSpec::output("out", ""),
            VolumeSpec::output("a/b", "/out"),
            VolumeSpec::output("..", "/out"),
        ] {
            let err = compose_prepared(results.path(), &[], &[bad]).await.unwrap_err();
            assert!(matches!(err, VfsError::InvalidVolume { .. }), "{err}");
        }
        assert_eq!(std::fs::read_dir(results.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_existing_output_dir_rejected() {
        let results = tempfile::tempdir().unwrap();
        std::fs::create_dir(results.path().join("out")).unwrap();
        let err = compose_prepared(results.path(), &[], &[VolumeSpec::output("out", "/out")])
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::OutputExists(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_dir_mode() {
        use std::os::unix::fs::PermissionsExt;

        let results = tempfile::tempdir().unwrap();
        compose_prepared(results.path(), &[], &[VolumeSpec::output("out", "/out")])
            .await
            .unwrap();
        let mode = std::fs::metadata(results.path().join("out"))
            .unwrap()
            .permissions()
            .mode();
        // umask may clear bits but never add them
        assert_eq!(mode & 0o700, 0o700);
        assert_eq!(mode & 0o777 & !0o755, 0);
    }
}
