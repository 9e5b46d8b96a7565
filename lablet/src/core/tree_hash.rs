//! Structural fingerprint of a script tree.
//!
//! The hash covers component names, kinds, nested sheet items and successor
//! branches, i.e. everything the positional persistence ids depend on. Texts
//! and other presentation details are deliberately left out so wording fixes
//! keep saved state loadable.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::core::component::{ComponentKind, ComponentNode};
use crate::tree::ScriptTree;

/// Hex SHA-256 of the tree's canonical shape description.
///
/// Nodes are described in pre-order; successor links refer to the pre-order
/// position of their target.
pub fn tree_hash(tree: &ScriptTree) -> String {
    let order = tree.preorder();
    let positions: BTreeMap<_, _> = order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();

    let mut description = String::new();
    for id in &order {
        let Some(node) = tree.node(*id) else {
            continue;
        };
        describe_component(&node.component, &mut description);
        description.push('{');
        for (branch, successor) in node.successors() {
            if let Some(position) = positions.get(&successor) {
                description.push_str(&format!("{branch}:{position},"));
            }
        }
        description.push_str("};");
    }

    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    hex::encode(hasher.finalize())
}

fn describe_component(component: &ComponentNode, out: &mut String) {
    out.push_str(component.kind().label());
    out.push('<');
    out.extend(component.name().escape_default());
    out.push('>');
    if let ComponentKind::Sheet(sheet) = component.kind() {
        out.push('[');
        for item in sheet.items().iter() {
            describe_component(item, out);
            out.push(',');
        }
        out.push(']');
    }
}
