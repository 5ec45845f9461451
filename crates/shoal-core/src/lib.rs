//! Shoal Core - Foundation types and collaborator traits for the shoal job
//! execution engine.
//!
//! This crate provides:
//! - The uniform [`ExecutionResult`] contract shared by every execution backend
//! - Job, volume and module specifications
//! - Output size limits used by the bounded subprocess runner
//! - The [`StorageResolver`] collaborator trait and a local filesystem resolver
//! - Home directory resolution for node state

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod dirs;
pub mod error;
pub mod job;
pub mod limits;
pub mod result;
pub mod size;
pub mod storage;
pub mod volume;

pub use dirs::ShoalHome;
pub use error::{StorageError, StorageResult};
pub use job::{DEFAULT_ENTRY_POINT, JobKind, JobSpec, ModuleSpec, ProcessSpec};
pub use limits::OutputLimits;
pub use result::{EXIT_CODE_UNSET, ExecutionFailure, ExecutionResult, FailureKind};
pub use size::{ByteSize, ByteSizeParseError};
pub use storage::{LocalStorage, StorageResolver};
pub use volume::{PreparedVolume, StorageLocator, VolumeSpec};
