//! Per-run directories under the user data directory.
//!
//! Each run of a script lives in its own directory named by
//! [`generate_script_uid`], so names sort chronologically.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use regex::Regex;
use tracing::info;

use crate::script::{SCRIPT_UID_TIME_FORMAT, generate_script_uid};

static RUN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})(?:_(.+))?$")
        .expect("run name pattern is valid")
});

/// A run directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    pub name: String,
    pub path: PathBuf,
    /// Creation time parsed from the name, if it follows the uid format.
    pub started: Option<NaiveDateTime>,
    /// Seed part of the name (usually the script name).
    pub seed: Option<String>,
}

impl RunEntry {
    fn from_dir(name: String, path: PathBuf) -> Self {
        let (started, seed) = match RUN_NAME_RE.captures(&name) {
            Some(caps) => (
                caps.get(1).and_then(|stamp| {
                    NaiveDateTime::parse_from_str(stamp.as_str(), SCRIPT_UID_TIME_FORMAT).ok()
                }),
                caps.get(2).map(|seed| seed.as_str().to_string()),
            ),
            None => (None, None),
        };
        Self {
            name,
            path,
            started,
            seed,
        }
    }
}

/// Create a fresh run directory named by the current time and `seed`.
///
/// A directory of the same name (same second, same seed) is an error; no
/// other name is tried.
pub fn create_run_dir(user_data_dir: &Path, seed: &str) -> Result<PathBuf> {
    create_named_run_dir(user_data_dir, &generate_script_uid(seed))
}

/// Create the run directory `name` below `user_data_dir`.
pub fn create_named_run_dir(user_data_dir: &Path, name: &str) -> Result<PathBuf> {
    validate_run_name(name)?;
    fs::create_dir_all(user_data_dir)
        .with_context(|| format!("create directory {}", user_data_dir.display()))?;
    let path = user_data_dir.join(name);
    match fs::create_dir(&path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            bail!("run directory {} already exists", path.display());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("create run directory {}", path.display()));
        }
    }
    info!(run = %path.display(), "created run directory");
    Ok(path)
}

/// Run directories, newest first. A missing user data directory has no runs.
pub fn list_runs(user_data_dir: &Path) -> Result<Vec<RunEntry>> {
    if !user_data_dir.exists() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in fs::read_dir(user_data_dir)
        .with_context(|| format!("read directory {}", user_data_dir.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", user_data_dir.display()))?;
        if !entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        runs.push(RunEntry::from_dir(name, entry.path()));
    }
    runs.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(runs)
}

/// Remove the run directory `name` and everything in it.
pub fn delete_run(user_data_dir: &Path, name: &str) -> Result<()> {
    validate_run_name(name)?;
    let path = user_data_dir.join(name);
    if !path.is_dir() {
        bail!("no run named {name} in {}", user_data_dir.display());
    }
    fs::remove_dir_all(&path).with_context(|| format!("delete run {}", path.display()))?;
    info!(run = %path.display(), "deleted run directory");
    Ok(())
}

fn validate_run_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("invalid run name '{name}'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_are_listed_newest_first() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in [
            "2014-05-01_10-15-30_pendulum",
            "2015-01-02_08-00-00_pendulum",
            "2014-12-31_23-59-59",
        ] {
            create_named_run_dir(temp.path(), name).expect("create");
        }
        fs::write(temp.path().join("notes.txt"), "not a run").expect("write");

        let runs = list_runs(temp.path()).expect("list");
        let names: Vec<&str> = runs.iter().map(|run| run.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2015-01-02_08-00-00_pendulum",
                "2014-12-31_23-59-59",
                "2014-05-01_10-15-30_pendulum",
            ]
        );
        assert_eq!(runs[0].seed.as_deref(), Some("pendulum"));
        assert_eq!(runs[1].seed, None);
        assert!(runs[1].started.is_some());
    }

    #[test]
    fn foreign_directories_have_no_timestamp() {
        let temp = tempfile::tempdir().expect("tempdir");
        create_named_run_dir(temp.path(), "scratch").expect("create");
        let runs = list_runs(temp.path()).expect("list");
        assert_eq!(runs[0].started, None);
        assert_eq!(runs[0].seed, None);
    }

    #[test]
    fn missing_user_data_dir_has_no_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(list_runs(&temp.path().join("missing")).expect("list").is_empty());
    }

    /// A second run in the same second with the same seed is refused.
    #[test]
    fn colliding_run_name_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        create_named_run_dir(temp.path(), "2014-05-01_10-15-30_demo").expect("create");
        let err = create_named_run_dir(temp.path(), "2014-05-01_10-15-30_demo")
            .expect_err("collision");
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn create_run_dir_uses_uid() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = create_run_dir(temp.path(), "demo").expect("create");
        let runs = list_runs(temp.path()).expect("list");
        assert_eq!(runs[0].path, path);
        assert_eq!(runs[0].seed.as_deref(), Some("demo"));
    }

    #[test]
    fn delete_removes_run_recursively() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = create_named_run_dir(temp.path(), "2014-05-01_10-15-30_demo").expect("create");
        fs::write(run.join("script_user_data.json"), "{}").expect("write");

        delete_run(temp.path(), "2014-05-01_10-15-30_demo").expect("delete");
        assert!(!run.exists());
        assert!(delete_run(temp.path(), "2014-05-01_10-15-30_demo").is_err());
        assert!(delete_run(temp.path(), "..").is_err());
    }
}
