//! Prelude module - commonly used types for convenient import.
//!
//! Use `use shoal_vfs::prelude::*;` to import all essential types.

pub use crate::{MountAccess, MountFs, MountInfo, MountKind, VfsError, VfsResult};
pub use crate::{compose, compose_prepared};
