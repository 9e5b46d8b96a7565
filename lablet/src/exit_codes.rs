//! Stable exit codes for `lablet` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: invalid script, config, run directory or arguments.
pub const INVALID: i32 = 1;
/// Saved state belongs to an earlier version of the script.
pub const INCOMPATIBLE: i32 = 2;
/// `lablet status` found nothing left to do in the run.
pub const COMPLETE: i32 = 3;
