//! Flattening the per-component state of a tree into a [`Bundle`] and back.
//!
//! Components are addressed positionally: pre-order index `0..n` with the
//! root at `0`. These ids only mean something for the exact tree shape they
//! were produced from, which is what the `scriptId` fingerprint guards.

use tracing::debug;

use crate::core::bundle::Bundle;
use crate::core::error::ScriptError;
use crate::core::tree_hash::tree_hash;
use crate::tree::ScriptTree;

/// Tree fingerprint of the script the state was saved from.
pub const SCRIPT_ID_KEY: &str = "scriptId";
/// File name of the script source, relative to the run directory.
pub const SCRIPT_NAME_KEY: &str = "script_name";
/// Index of the last viewed page in the active chain.
pub const CURRENT_FRAGMENT_KEY: &str = "current_fragment";

/// Write the fingerprint and one sub-bundle per component into `bundle`.
pub fn save_tree_state(tree: &ScriptTree, bundle: &mut Bundle) -> Result<(), ScriptError> {
    if tree.is_empty() {
        return Err(ScriptError::NotLoaded);
    }
    bundle.put_string(SCRIPT_ID_KEY, tree_hash(tree));
    for (id, node) in tree.preorder().into_iter().enumerate() {
        let Some(component) = tree.component(node) else {
            continue;
        };
        let mut component_bundle = Bundle::new();
        component.to_bundle(&mut component_bundle);
        bundle.put_bundle(id.to_string(), component_bundle);
    }
    Ok(())
}

/// Restore the state in `bundle` onto a copy of `tree`.
///
/// The input tree is never touched; on success the caller swaps in the
/// returned tree, so a failed restore leaves no partial state behind.
pub fn restore_tree_state(tree: &ScriptTree, bundle: &Bundle) -> Result<ScriptTree, ScriptError> {
    if tree.is_empty() {
        return Err(ScriptError::NotLoaded);
    }
    let expected = tree_hash(tree);
    match bundle.get_string(SCRIPT_ID_KEY) {
        Some(saved) if saved == expected => {}
        saved => {
            debug!(?saved, %expected, "saved state fingerprint mismatch");
            return Err(ScriptError::Incompatible);
        }
    }

    let mut restored = tree.clone();
    for (id, node) in tree.preorder().into_iter().enumerate() {
        let component_bundle = bundle
            .get_bundle(&id.to_string())
            .ok_or(ScriptError::MissingComponentState { id })?;
        let component = restored
            .component_mut(node)
            .ok_or_else(|| ScriptError::UnknownComponent(node.to_string()))?;
        component.from_bundle(component_bundle)?;
    }
    Ok(restored)
}
