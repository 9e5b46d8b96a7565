//! Lablet configuration stored in `lablet.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "lablet.toml";

/// Lablet configuration (TOML).
///
/// Missing fields default to the layout the app has always used, so an
/// absent file is equivalent to an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabletConfig {
    /// Directory holding one sub-directory per script run.
    pub user_data_dir: String,

    /// Name of the saved state file inside a run directory.
    pub state_file_name: String,

    /// Name of the answer export inside a run directory.
    pub export_file_name: String,

    /// Directory inside a run that holds recorded experiments.
    pub experiments_dir_name: String,
}

impl Default for LabletConfig {
    fn default() -> Self {
        Self {
            user_data_dir: "script_user_data".to_string(),
            state_file_name: "script_user_data.json".to_string(),
            export_file_name: "answers.md".to_string(),
            experiments_dir_name: "experiments".to_string(),
        }
    }
}

impl LabletConfig {
    pub fn validate(&self) -> Result<()> {
        if self.user_data_dir.trim().is_empty() {
            return Err(anyhow!("user_data_dir must not be empty"));
        }
        for (key, value) in [
            ("state_file_name", &self.state_file_name),
            ("export_file_name", &self.export_file_name),
            ("experiments_dir_name", &self.experiments_dir_name),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{key} must not be empty"));
            }
            if value.contains(['/', '\\']) {
                return Err(anyhow!("{key} must be a plain file name, got '{value}'"));
            }
        }
        if self.state_file_name == self.export_file_name {
            return Err(anyhow!("state_file_name and export_file_name must differ"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LabletConfig::default()`.
pub fn load_config(path: &Path) -> Result<LabletConfig> {
    if !path.exists() {
        let cfg = LabletConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LabletConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &LabletConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
