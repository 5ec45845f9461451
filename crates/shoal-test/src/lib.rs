//! Shoal Test - Shared test utilities for the shoal execution engine.
//!
//! This crate provides fixtures and mock collaborators that can be used
//! across multiple shoal crates as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! shoal-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use shoal_test::{StaticStorage, TestJobDir};
//!
//! #[tokio::test]
//! async fn test_resolves_inputs() {
//!     let job = TestJobDir::new();
//!     let data = job.write_input("data.txt", b"hello");
//!     let storage = StaticStorage::new().with_entry("ipfs://data", &data);
//!     // ...
//!     assert_eq!(storage.resolve_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
