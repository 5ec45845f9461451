//! Shoal CLI - run compute jobs locally.
//!
//! `exec` runs a host command with bounded output capture; `wasm` runs a
//! WebAssembly module in the sandbox. Both write `stdout`, `stderr` and
//! `exitCode` into a results directory and print the result as JSON.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

mod commands;
pub mod config_bridge;

use commands::exec::ExecArgs;
use commands::wasm::WasmArgs;

/// Shoal - compute job execution
#[derive(Parser)]
#[command(name = "shoal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra configuration file, merged above the user config
    #[arg(short, long, global = true, env = "SHOAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a host command
    Exec(ExecArgs),

    /// Run a WebAssembly module
    Wasm(WasmArgs),

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show {
        /// Output format: toml or json
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

fn fallback_message(e: &shoal_config::ConfigError) -> String {
    match e.layer() {
        Some(layer) => format!("Failed to load the {layer} config file, using defaults: {e}"),
        None => format!("Failed to resolve configuration, using defaults: {e}"),
    }
}

fn load_config(explicit: Option<&std::path::Path>) -> Result<shoal_config::ResolvedConfig> {
    match shoal_config::Config::load(explicit) {
        Ok(resolved) => Ok(resolved),
        // An explicit file the user asked for must load.
        Err(e) if explicit.is_some() => Err(e).context("failed to load configuration"),
        // Logging is not up yet, so report straight to stderr.
        Err(e) => {
            eprintln!("{}", fallback_message(&e));
            Ok(shoal_config::ResolvedConfig {
                config: shoal_config::Config::default(),
                field_sources: shoal_config::FieldSources::new(),
                loaded_files: Vec::new(),
            })
        },
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let resolved = load_config(cli.config.as_deref())?;

    let mut log_config = config_bridge::to_log_config(&resolved.config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = shoal_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = match cli.command {
        Commands::Exec(args) => commands::exec::run_exec(&resolved.config, args).await?,
        Commands::Wasm(args) => commands::wasm::run_wasm(&resolved.config, args).await?,
        Commands::Config { command } => {
            match command {
                ConfigCommands::Show { format } => {
                    commands::config::show_config(&resolved, &format)?;
                },
            }
            return Ok(ExitCode::SUCCESS);
        },
    };

    if let Some(failure) = &result.failure {
        warn!(kind = %failure.kind, error = %failure.message, "Job failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
