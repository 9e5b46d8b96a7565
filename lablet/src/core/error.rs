//! Error taxonomy for the script engine core.

use thiserror::Error;

/// Failures surfaced by core script operations.
///
/// The `Display` text of each variant is what `Script::last_error` reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script is not loaded")]
    NotLoaded,

    /// A misconfigured component, attributed to the failing component itself.
    #[error("In Component \"{component}\": {message}")]
    Validation { component: String, message: String },

    /// Saved state was produced by a structurally different script.
    #[error("Script has been updated and is now incompatible to the saved state.")]
    Incompatible,

    #[error("Script component state can't be restored (no state for component {id}).")]
    MissingComponentState { id: usize },

    #[error("component \"{component}\": missing required key '{key}'")]
    MissingKey { component: String, key: &'static str },

    #[error("component \"{component}\": invalid value for '{key}'")]
    InvalidValue { component: String, key: &'static str },

    #[error("unknown component {0}")]
    UnknownComponent(String),

    #[error("component \"{component}\" does not accept {interaction}")]
    UnsupportedInteraction {
        component: String,
        interaction: &'static str,
    },

    #[error("invalid script structure: {0}")]
    Structure(String),
}
