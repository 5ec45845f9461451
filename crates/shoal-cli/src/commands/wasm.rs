//! `shoal wasm`: run a WebAssembly module job.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use shoal_config::Config;
use shoal_core::{ByteSize, ExecutionResult, JobKind, JobSpec, ModuleSpec, StorageLocator, VolumeSpec};

use super::report::{RunOptions, new_job_id, run_and_report};

/// Arguments for `shoal wasm`.
#[derive(Debug, Args)]
pub(crate) struct WasmArgs {
    /// Locator of the entry module (a .wasm file or a directory holding one)
    module: String,

    /// Export to call (defaults to `wasm.default_entry_point`)
    #[arg(long)]
    entry_point: Option<String>,

    /// Argument passed to the module; repeatable, order is kept
    #[arg(long = "param")]
    params: Vec<String>,

    /// Environment variable as KEY=VALUE; repeatable
    #[arg(long = "env")]
    env: Vec<String>,

    /// Locator of a module instantiated before the entry module; repeatable
    #[arg(long = "import")]
    imports: Vec<String>,

    /// Input volume as SOURCE:MOUNT_PATH; repeatable
    #[arg(long = "input")]
    inputs: Vec<String>,

    /// Output volume as NAME:MOUNT_PATH; repeatable
    #[arg(long = "output")]
    outputs: Vec<String>,

    /// Memory ceiling such as 64MB or 1GiB
    #[arg(long)]
    memory: Option<ByteSize>,

    /// Directory for outputs, stdout, stderr and exitCode
    #[arg(long)]
    results: Option<PathBuf>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

/// Split `KEY=VALUE`.
pub(crate) fn parse_env(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => bail!("expected KEY=VALUE, got '{raw}'"),
    }
}

/// Parse `SOURCE:MOUNT_PATH`. The split is on the last colon so `file://`
/// sources work; the volume is named after the source's file stem.
pub(crate) fn parse_input(raw: &str) -> Result<VolumeSpec> {
    match raw.rsplit_once(':') {
        Some((source, mount)) if !source.is_empty() && mount.starts_with('/') => {
            let locator = StorageLocator::new(source);
            Ok(VolumeSpec::input(locator.stem().to_owned(), mount, locator))
        },
        _ => bail!("expected SOURCE:/mount/path, got '{raw}'"),
    }
}

/// Parse `NAME:MOUNT_PATH`.
pub(crate) fn parse_output(raw: &str) -> Result<VolumeSpec> {
    match raw.split_once(':') {
        Some((name, mount)) if !name.is_empty() && mount.starts_with('/') => {
            Ok(VolumeSpec::output(name, mount))
        },
        _ => bail!("expected NAME:/mount/path, got '{raw}'"),
    }
}

/// Build the job described by `args`.
pub(crate) fn build_job(cfg: &Config, args: &WasmArgs) -> Result<JobSpec> {
    let entry_point = args
        .entry_point
        .clone()
        .unwrap_or_else(|| cfg.wasm.default_entry_point.clone());

    let mut module = ModuleSpec::new(args.module.as_str()).with_entry_point(entry_point);
    for param in &args.params {
        module = module.with_parameter(param.as_str());
    }
    for raw in &args.env {
        let (key, value) = parse_env(raw)?;
        module = module.with_env(key, value);
    }
    for import in &args.imports {
        module = module.with_import(import.as_str());
    }
    if let Some(memory) = args.memory {
        module = module.with_memory_limit(memory);
    }

    let mut job = JobSpec::new(new_job_id(), JobKind::Module(module));
    for raw in &args.inputs {
        job = job.with_input(parse_input(raw)?);
    }
    for raw in &args.outputs {
        job = job.with_output(parse_output(raw)?);
    }
    Ok(job)
}

pub(crate) async fn run_wasm(cfg: &Config, args: WasmArgs) -> Result<ExecutionResult> {
    let job = build_job(cfg, &args)?;
    run_and_report(
        cfg,
        job,
        RunOptions {
            results: args.results,
            timeout_secs: args.timeout,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(module: &str) -> WasmArgs {
        WasmArgs {
            module: module.to_owned(),
            entry_point: None,
            params: vec!["a".to_owned(), "b".to_owned()],
            env: vec!["B=2".to_owned(), "A=1".to_owned()],
            imports: vec!["lib.wasm".to_owned()],
            inputs: vec!["file:///data/in.csv:/inputs/in.csv".to_owned()],
            outputs: vec!["outputs:/outputs".to_owned()],
            memory: Some(ByteSize::mib(64)),
            results: None,
            timeout: None,
        }
    }

    #[test]
    fn test_parse_env() {
        assert_eq!(
            parse_env("PATH=/bin:/usr/bin").unwrap(),
            ("PATH".to_owned(), "/bin:/usr/bin".to_owned())
        );
        assert_eq!(parse_env("EMPTY=").unwrap().1, "");
        assert!(parse_env("=x").is_err());
        assert!(parse_env("novalue").is_err());
    }

    #[test]
    fn test_parse_input_splits_on_last_colon() {
        let volume = parse_input("file:///data/in.csv:/inputs/in.csv").unwrap();
        assert_eq!(volume.mount_path, "/inputs/in.csv");
        assert_eq!(
            volume.source.as_ref().map(StorageLocator::as_str),
            Some("file:///data/in.csv")
        );
        assert!(parse_input("/data/in.csv").is_err());
        assert!(parse_input("/data/in.csv:relative").is_err());
    }

    #[test]
    fn test_parse_output() {
        let volume = parse_output("outputs:/outputs").unwrap();
        assert_eq!(volume.name, "outputs");
        assert_eq!(volume.mount_path, "/outputs");
        assert!(volume.source.is_none());
        assert!(parse_output(":/outputs").is_err());
    }

    #[test]
    fn test_build_job_uses_config_entry_point() {
        let mut cfg = Config::default();
        cfg.wasm.default_entry_point = "main".to_owned();

        let job = build_job(&cfg, &args("app.wasm")).unwrap();
        let JobKind::Module(module) = &job.kind else {
            panic!("expected a module job");
        };
        assert_eq!(module.entry_point, "main");
        assert_eq!(module.parameters, vec!["a", "b"]);
        assert_eq!(module.import_modules.len(), 1);
        assert_eq!(module.memory_limit, Some(ByteSize::mib(64)));
        assert_eq!(job.inputs.len(), 1);
        assert_eq!(job.outputs.len(), 1);
    }
}
