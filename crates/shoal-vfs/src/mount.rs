use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::path::{normalize_mount_path, overlaps};
use crate::{VfsError, VfsResult};

/// Whether a mount accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountAccess {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// What backs a mount on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    /// An input directory.
    Directory,
    /// An input consisting of a single file.
    File,
    /// An output directory in the job results directory.
    Output,
}

/// Description of one mount, for backends that attach the host paths
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    /// Normalised absolute path inside the job's namespace.
    pub guest_path: String,
    /// Host directory, or host file for [`MountKind::File`].
    pub host_path: PathBuf,
    /// Read-only or read-write.
    pub access: MountAccess,
    /// Backing kind.
    pub kind: MountKind,
}

/// A single logical root made of non-overlapping mounts.
///
/// Backends attach each mount's host path at its guest path; nothing outside
/// the table is reachable from the job.
#[derive(Debug, Default)]
pub struct MountFs {
    mounts: Vec<MountInfo>,
}

impl MountFs {
    /// Create an empty mount table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mount at `info.guest_path`.
    ///
    /// The guest path is normalised before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::InvalidMountPath` if the path cannot be normalised
    /// and `VfsError::MountConflict` if it equals or nests with an existing
    /// mount.
    pub fn mount(&mut self, mut info: MountInfo) -> VfsResult<()> {
        let guest = normalize_mount_path(&info.guest_path)?;
        if let Some(existing) = self.mounts.iter().find(|m| overlaps(&m.guest_path, &guest)) {
            return Err(VfsError::MountConflict {
                path: guest,
                existing: existing.guest_path.clone(),
            });
        }

        debug!(
            guest = %guest,
            host = %info.host_path.display(),
            access = ?info.access,
            kind = ?info.kind,
            "Mounted volume"
        );
        info.guest_path = guest;
        self.mounts.push(info);
        Ok(())
    }

    /// Descriptions of every mount, in the order they were added.
    pub fn mounts(&self) -> impl Iterator<Item = &MountInfo> {
        self.mounts.iter()
    }

    /// Number of mounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Whether nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(guest: &str, host: &str, kind: MountKind) -> MountInfo {
        MountInfo {
            guest_path: guest.into(),
            host_path: PathBuf::from(host),
            access: MountAccess::ReadOnly,
            kind,
        }
    }

    #[test]
    fn test_duplicate_and_overlapping_mounts_rejected() {
        let mut fs = MountFs::new();
        fs.mount(info("/data", "/unused", MountKind::Directory)).unwrap();

        let dup = fs.mount(info("data/", "/unused", MountKind::Directory));
        assert!(matches!(dup, Err(VfsError::MountConflict { .. })));

        let nested = fs.mount(info("/data/sub", "/unused", MountKind::Directory));
        assert!(matches!(nested, Err(VfsError::MountConflict { .. })));

        let parent = fs.mount(info("/", "/unused", MountKind::Directory));
        assert!(matches!(parent, Err(VfsError::MountConflict { .. })));

        fs.mount(info("/database", "/unused", MountKind::Directory)).unwrap();
        assert_eq!(fs.len(), 2);
        assert_eq!(
            fs.mounts().map(|m| m.guest_path.as_str()).collect::<Vec<_>>(),
            vec!["/data", "/database"]
        );
    }

    #[test]
    fn test_invalid_mount_path_rejected() {
        let mut fs = MountFs::new();
        let err = fs.mount(info("/a/../b", "/unused", MountKind::Directory));
        assert!(matches!(err, Err(VfsError::InvalidMountPath { .. })));
        assert!(fs.is_empty());
    }
}
