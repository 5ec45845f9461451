//! Node state directory (`~/.shoal/` or `$SHOAL_HOME`).
//!
//! # Layout
//!
//! ```text
//! ~/.shoal/
//! ├── config.toml     (user-level configuration)
//! ├── logs/           (rolling log files)
//! └── jobs/<id>/      (per-job results directories)
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Global shoal home directory.
#[derive(Debug, Clone)]
pub struct ShoalHome {
    root: PathBuf,
}

impl ShoalHome {
    /// Resolve the home directory.
    ///
    /// Checks `$SHOAL_HOME` first, then falls back to `$HOME/.shoal/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `$SHOAL_HOME` is relative, or if neither variable
    /// is set.
    pub fn resolve() -> io::Result<Self> {
        Self::resolve_from(|key| std::env::var(key).ok())
    }

    /// Resolve using an explicit variable lookup instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`ShoalHome::resolve`].
    pub fn resolve_from(lookup: impl Fn(&str) -> Option<String>) -> io::Result<Self> {
        let root = if let Some(custom) = lookup("SHOAL_HOME") {
            let p = PathBuf::from(custom);
            if !p.is_absolute() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "SHOAL_HOME must be an absolute path",
                ));
            }
            p
        } else {
            let home = lookup("HOME").ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "neither SHOAL_HOME nor HOME environment variable is set",
                )
            })?;
            PathBuf::from(home).join(".shoal")
        };

        Ok(Self { root })
    }

    /// Create from an explicit path.
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the `logs/` and `jobs/` subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.jobs_dir())?;
        Ok(())
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// User configuration file (`~/.shoal/config.toml`).
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Logs directory (`~/.shoal/logs/`).
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Parent of all per-job results directories (`~/.shoal/jobs/`).
    #[must_use]
    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    /// Results directory for one job.
    #[must_use]
    pub fn job_results_dir(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(job_id)
    }
}
