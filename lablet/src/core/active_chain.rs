//! Deterministic resolution of the components visible to the learner.

use crate::tree::{NodeId, ScriptTree};

/// Follow completed components from the root.
///
/// The chain holds the root plus every successor reached through a completed
/// component, and ends at the first incomplete component (inclusive) or where
/// a completed component has no successor for its branch. Returns an empty
/// chain for an empty tree.
pub fn active_chain(tree: &ScriptTree) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut current = tree.root();
    while let Some(id) = current {
        let Some(node) = tree.node(id) else {
            break;
        };
        chain.push(id);
        current = node
            .component
            .state()
            .branch()
            .and_then(|branch| node.successor(branch));
    }
    chain
}

/// True if the learner has nothing left to do: the last component in the
/// chain is complete and leads nowhere.
pub fn is_complete(tree: &ScriptTree, chain: &[NodeId]) -> bool {
    let Some(last) = chain.last().and_then(|id| tree.node(*id)) else {
        return false;
    };
    match last.component.state().branch() {
        Some(branch) => last.successor(branch).is_none(),
        None => false,
    }
}
