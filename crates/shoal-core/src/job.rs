//! Job specifications.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::size::ByteSize;
use crate::volume::{StorageLocator, VolumeSpec};

/// Entry point used when a module job does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "_start";

/// A unit of work submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job identifier, used for logging only.
    pub id: String,
    /// What to run.
    pub kind: JobKind,
    /// Declared input volumes.
    #[serde(default)]
    pub inputs: Vec<VolumeSpec>,
    /// Declared output volumes.
    #[serde(default)]
    pub outputs: Vec<VolumeSpec>,
    /// Wall-clock limit for the whole execution.
    #[serde(default, with = "optional_secs")]
    pub timeout: Option<Duration>,
}

impl JobSpec {
    /// Create a job with no volumes and no timeout.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            timeout: None,
        }
    }

    /// Add an input volume.
    #[must_use]
    pub fn with_input(mut self, volume: VolumeSpec) -> Self {
        self.inputs.push(volume);
        self
    }

    /// Add an output volume.
    #[must_use]
    pub fn with_output(mut self, volume: VolumeSpec) -> Self {
        self.outputs.push(volume);
        self
    }

    /// Set the wall-clock limit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Which backend a job runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobKind {
    /// An arbitrary subprocess.
    Process(ProcessSpec),
    /// A sandboxed virtual-machine module.
    Module(ModuleSpec),
}

/// A subprocess command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Program to execute.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ProcessSpec {
    /// Create a process spec.
    #[must_use]
    pub fn new(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// A sandboxed module invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Where the entry module is stored.
    pub entry_module: StorageLocator,
    /// Exported function to call.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Arguments, appended after the module name in the argument vector.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Modules instantiated before the entry module, in order.
    #[serde(default)]
    pub import_modules: Vec<StorageLocator>,
    /// Environment variables. Applied sorted by name regardless of the
    /// iteration order of this map.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Linear memory ceiling.
    #[serde(default)]
    pub memory_limit: Option<ByteSize>,
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_owned()
}

impl ModuleSpec {
    /// Create a module spec calling the default entry point.
    #[must_use]
    pub fn new(entry_module: impl Into<StorageLocator>) -> Self {
        Self {
            entry_module: entry_module.into(),
            entry_point: default_entry_point(),
            parameters: Vec::new(),
            import_modules: Vec::new(),
            environment: HashMap::new(),
            memory_limit: None,
        }
    }

    /// Set the exported function to call.
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    /// Append an import module.
    #[must_use]
    pub fn with_import(mut self, locator: impl Into<StorageLocator>) -> Self {
        self.import_modules.push(locator.into());
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set the memory ceiling.
    #[must_use]
    pub fn with_memory_limit(mut self, limit: ByteSize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Environment variables in ascending name order.
    #[must_use]
    pub fn sorted_environment(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_defaults() {
        let spec = ModuleSpec::new("file:///mods/main.wasm");
        assert_eq!(spec.entry_point, "_start");
        assert!(spec.memory_limit.is_none());
    }

    #[test]
    fn test_sorted_environment() {
        let spec = ModuleSpec::new("m.wasm")
            .with_env("ZED", "1")
            .with_env("ALPHA", "2")
            .with_env("MID", "3");
        let names: Vec<_> = spec
            .sorted_environment()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(names, vec!["ALPHA", "MID", "ZED"]);
    }

    #[test]
    fn test_job_deserialize() {
        let json = r#"{
            "id": "job-1",
            "kind": {"type": "module", "entry_module": "file:///m.wasm", "memory_limit": "64MB"},
            "outputs": [{"name": "outputs", "mount_path": "/outputs"}],
            "timeout": 30
        }"#;
        let job: JobSpec = serde_json::from_str(json).unwrap();
        assert_eq!(job.timeout, Some(Duration::from_secs(30)));
        let JobKind::Module(module) = job.kind else {
            panic!("expected module job");
        };
        assert_eq!(module.entry_point, DEFAULT_ENTRY_POINT);
        assert_eq!(module.memory_limit, Some(ByteSize::mib(64)));
        assert_eq!(job.outputs.len(), 1);
    }

    #[test]
    fn test_process_job() {
        let job = JobSpec::new("p", JobKind::Process(ProcessSpec::new("echo", ["hi"])))
            .with_timeout(Duration::from_secs(5));
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"type\":\"process\""));
        assert!(json.contains("\"timeout\":5"));
    }
}
