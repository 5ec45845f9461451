use std::path::{Component, Path};

use crate::{VfsError, VfsResult};

/// Strip leading separators so guest paths such as `/data/x` and `data/x`
/// address the same entry relative to a filesystem root.
#[must_use]
pub fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Normalise a guest mount path to an absolute, `/`-separated form without
/// `.` segments or trailing separators.
///
/// # Errors
///
/// Returns `VfsError::InvalidMountPath` for empty paths and paths containing
/// `..`.
pub fn normalize_mount_path(path: &str) -> VfsResult<String> {
    let invalid = |reason: &str| VfsError::InvalidMountPath {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };

    if path.trim().is_empty() {
        return Err(invalid("mount path is empty"));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => return Err(invalid("mount path may not contain '..'")),
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// The part of `path` below `mount`, if `path` lies at or under it.
///
/// Both arguments must be normalised.
#[must_use]
pub fn strip_mount<'a>(mount: &str, path: &'a str) -> Option<&'a str> {
    if mount == "/" {
        return Some(relative(path));
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// Whether one mount path equals or contains the other.
#[must_use]
pub fn overlaps(a: &str, b: &str) -> bool {
    strip_mount(a, b).is_some() || strip_mount(b, a).is_some()
}

/// Whether `name` is exactly one normal path component.
#[must_use]
pub fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path("outputs").unwrap(), "/outputs");
        assert_eq!(normalize_mount_path("/a//b/./").unwrap(), "/a/b");
        assert_eq!(normalize_mount_path("/").unwrap(), "/");
        assert!(normalize_mount_path("").is_err());
        assert!(normalize_mount_path("/a/../b").is_err());
    }

    #[test]
    fn test_strip_mount() {
        assert_eq!(strip_mount("/a", "/a"), Some(""));
        assert_eq!(strip_mount("/a", "/a/x/y"), Some("x/y"));
        assert_eq!(strip_mount("/a", "/ab"), None);
        assert_eq!(strip_mount("/", "/ab"), Some("ab"));
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps("/data", "/data/sub"));
        assert!(overlaps("/data/sub", "/data"));
        assert!(overlaps("/x", "/x"));
        assert!(!overlaps("/data", "/database"));
        assert!(overlaps("/", "/anything"));
    }

    #[test]
    fn test_single_component() {
        assert!(is_single_component("outputs"));
        assert!(!is_single_component(""));
        assert!(!is_single_component("a/b"));
        assert!(!is_single_component(".."));
        assert!(!is_single_component("."));
        assert!(!is_single_component("/abs"));
    }
}
