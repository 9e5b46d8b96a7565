//! Saved script state on disk: one JSON-encoded [`Bundle`] per run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::bundle::Bundle;

/// Load a saved state bundle.
pub fn load_state_file(path: &Path) -> Result<Bundle> {
    debug!(path = %path.display(), "loading script state");
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read script state {}", path.display()))?;
    let bundle: Bundle = serde_json::from_str(&contents)
        .with_context(|| format!("parse script state {}", path.display()))?;
    Ok(bundle)
}

/// Atomically replace the saved state with `bundle`.
pub fn write_state_file(path: &Path, bundle: &Bundle) -> Result<()> {
    debug!(path = %path.display(), entries = bundle.len(), "writing script state");
    let mut buf = serde_json::to_string_pretty(bundle).context("serialize script state")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
