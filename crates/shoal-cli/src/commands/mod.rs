//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod exec;
pub(crate) mod report;
pub(crate) mod wasm;
