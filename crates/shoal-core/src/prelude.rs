//! Prelude module - commonly used types for convenient import.
//!
//! Use `use shoal_core::prelude::*;` to import all essential types.

// Results
pub use crate::{EXIT_CODE_UNSET, ExecutionFailure, ExecutionResult, FailureKind};

// Job model
pub use crate::{JobKind, JobSpec, ModuleSpec, ProcessSpec};

// Volumes and storage
pub use crate::{LocalStorage, PreparedVolume, StorageLocator, StorageResolver, VolumeSpec};
pub use crate::{StorageError, StorageResult};

// Limits
pub use crate::{ByteSize, OutputLimits};
