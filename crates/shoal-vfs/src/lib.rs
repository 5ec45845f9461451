//! Shoal Virtual File System (VFS).
//!
//! Builds the single namespace a job sees: each declared input is mounted
//! read-only, each declared output gets a fresh directory under the job's
//! results directory and is mounted write-capable. The result is a mount
//! table; execution backends attach each entry's host path at its guest
//! path, so nothing outside the mounts is reachable.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Job filesystem composition from declared volumes.
pub mod compose;
/// Virtual filesystem error types.
pub mod error;
/// Mount table combining several host paths under one root.
pub mod mount;
/// Mount path normalisation and validation.
pub mod path;

pub use compose::{compose, compose_prepared};
pub use error::{VfsError, VfsResult};
pub use mount::{MountAccess, MountFs, MountInfo, MountKind};
