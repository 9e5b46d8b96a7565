//! Canonical paths inside a script run directory.

use std::path::{Path, PathBuf};

use crate::io::config::LabletConfig;

/// All paths a session touches within one run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub run_dir: PathBuf,
    pub state_path: PathBuf,
    pub export_path: PathBuf,
    pub experiments_dir: PathBuf,
}

impl RunPaths {
    pub fn new(run_dir: impl Into<PathBuf>, cfg: &LabletConfig) -> Self {
        let run_dir = run_dir.into();
        Self {
            state_path: run_dir.join(&cfg.state_file_name),
            export_path: run_dir.join(&cfg.export_file_name),
            experiments_dir: run_dir.join(&cfg.experiments_dir_name),
            run_dir,
        }
    }

    /// Location of the run's private copy of the script source.
    pub fn script_copy(&self, script_name: &str) -> PathBuf {
        self.run_dir.join(script_name)
    }

    /// Run-relative form of `path`, if it lies inside the run directory.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.run_dir).ok()
    }
}
