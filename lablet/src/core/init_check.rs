//! Pre-flight validation of a script tree.

use crate::core::error::ScriptError;
use crate::tree::ScriptTree;

/// Check every tree node in pre-order, stopping at the first failure.
///
/// The returned error names the component that is actually misconfigured,
/// which may be an item nested inside a sheet.
pub fn check_tree(tree: &ScriptTree) -> Result<(), ScriptError> {
    if tree.is_empty() {
        return Err(ScriptError::NotLoaded);
    }
    for id in tree.preorder() {
        if let Some(component) = tree.component(id) {
            component.init_check()?;
        }
    }
    Ok(())
}
