//! Test fixtures for job directories and specifications.

use std::path::{Path, PathBuf};

use shoal_core::{JobKind, JobSpec, ModuleSpec, ProcessSpec};
use tempfile::TempDir;
use uuid::Uuid;

/// A scratch area holding input data and a results directory for one job.
///
/// Everything is removed when the fixture is dropped.
#[derive(Debug)]
pub struct TestJobDir {
    root: TempDir,
}

impl TestJobDir {
    /// Create a fresh scratch area with empty `inputs/` and `results/`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir(root.path().join("inputs")).expect("create inputs dir");
        std::fs::create_dir(root.path().join("results")).expect("create results dir");
        Self { root }
    }

    /// Root of the scratch area.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Directory where input fixtures are written.
    #[must_use]
    pub fn inputs_dir(&self) -> PathBuf {
        self.root.path().join("inputs")
    }

    /// The job results directory.
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.root.path().join("results")
    }

    /// Write a file under `inputs/`, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[allow(clippy::expect_used)]
    pub fn write_input(&self, relative: impl AsRef<Path>, contents: &[u8]) -> PathBuf {
        let path = self.inputs_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create input parent");
        }
        std::fs::write(&path, contents).expect("write input");
        path
    }

    /// Create an empty directory under `inputs/`.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[allow(clippy::expect_used)]
    pub fn input_dir(&self, relative: impl AsRef<Path>) -> PathBuf {
        let path = self.inputs_dir().join(relative);
        std::fs::create_dir_all(&path).expect("create input dir");
        path
    }
}

impl Default for TestJobDir {
    fn default() -> Self {
        Self::new()
    }
}

/// A process job with a random id and no volumes.
#[must_use]
pub fn process_job(command: &str, args: &[&str]) -> JobSpec {
    JobSpec::new(
        format!("job-{}", Uuid::new_v4()),
        JobKind::Process(ProcessSpec::new(command, args.iter().copied())),
    )
}

/// A module job with a random id and no volumes.
#[must_use]
pub fn module_job(module: ModuleSpec) -> JobSpec {
    JobSpec::new(format!("job-{}", Uuid::new_v4()), JobKind::Module(module))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_dir_layout() {
        let job = TestJobDir::new();
        assert!(job.inputs_dir().is_dir());
        assert!(job.results_dir().is_dir());

        let file = job.write_input("nested/data.txt", b"abc");
        assert_eq!(std::fs::read(&file).unwrap(), b"abc");
        assert!(job.input_dir("empty").is_dir());
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = process_job("true", &[]);
        let b = process_job("true", &[]);
        assert_ne!(a.id, b.id);
    }
}
