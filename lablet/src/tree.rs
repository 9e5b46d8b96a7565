//! Arena-backed script tree.
//!
//! Nodes are owned by the arena; successor links are plain indices keyed by
//! the completion branch that follows them (branch 0 is the ordinary "next"
//! component). Every node except the root has exactly one parent, so the
//! successor links form a tree.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::component::ComponentNode;
use crate::core::error::ScriptError;

/// Arena index of a tree node. Not stable across loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub component: ComponentNode,
    parent: Option<NodeId>,
    successors: BTreeMap<u32, NodeId>,
}

impl TreeNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Successor links in ascending branch order.
    pub fn successors(&self) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        self.successors.iter().map(|(branch, id)| (*branch, *id))
    }

    pub fn successor(&self, branch: u32) -> Option<NodeId> {
        self.successors.get(&branch).copied()
    }
}

/// The component tree of a loaded script. An empty tree has no root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptTree {
    nodes: Vec<TreeNode>,
}

impl ScriptTree {
    pub fn new(root: ComponentNode) -> Self {
        Self {
            nodes: vec![TreeNode {
                component: root,
                parent: None,
                successors: BTreeMap::new(),
            }],
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn component(&self, id: NodeId) -> Option<&ComponentNode> {
        self.node(id).map(|node| &node.component)
    }

    pub(crate) fn component_mut(&mut self, id: NodeId) -> Option<&mut ComponentNode> {
        self.nodes.get_mut(id.0).map(|node| &mut node.component)
    }

    /// Append `component` as the ordinary next step after `from`.
    pub fn add_next(&mut self, from: NodeId, component: ComponentNode) -> Result<NodeId, ScriptError> {
        self.add_branch(from, 0, component)
    }

    /// Append `component` as the successor taken when `from` completes with
    /// branch `branch`.
    pub fn add_branch(
        &mut self,
        from: NodeId,
        branch: u32,
        component: ComponentNode,
    ) -> Result<NodeId, ScriptError> {
        let id = NodeId(self.nodes.len());
        let parent = self
            .nodes
            .get_mut(from.0)
            .ok_or_else(|| ScriptError::UnknownComponent(from.to_string()))?;
        if let Some(existing) = parent.successors.get(&branch) {
            return Err(ScriptError::Structure(format!(
                "\"{}\" already continues with {existing} on branch {branch}",
                parent.component.name()
            )));
        }
        parent.successors.insert(branch, id);
        self.nodes.push(TreeNode {
            component,
            parent: Some(from),
            successors: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Depth-first pre-order from the root: a node, then each successor
    /// subtree in ascending branch order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root() else {
            return order;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = &self.nodes[id.0];
            stack.extend(node.successors.values().rev().copied());
        }
        order
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|id| self.nodes[id.0].component.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str) -> ComponentNode {
        ComponentNode::checkbox(name, format!("{name} done?"))
    }

    #[test]
    fn empty_tree_has_no_root() {
        let tree = ScriptTree::default();
        assert_eq!(tree.root(), None);
        assert!(tree.preorder().is_empty());
    }

    /// Pre-order visits a node's whole branch subtree before its next sibling branch.
    #[test]
    fn preorder_visits_children_before_siblings() {
        let mut tree = ScriptTree::new(step("root"));
        let root = tree.root().expect("root");
        let a = tree.add_next(root, step("a")).expect("a");
        tree.add_next(a, step("a1")).expect("a1");
        tree.add_branch(root, 1, step("b")).expect("b");

        let names: Vec<&str> = tree
            .preorder()
            .into_iter()
            .map(|id| tree.component(id).expect("node").name())
            .collect();
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn add_branch_rejects_occupied_slot() {
        let mut tree = ScriptTree::new(step("root"));
        let root = tree.root().expect("root");
        tree.add_next(root, step("a")).expect("a");
        let err = tree.add_next(root, step("b")).expect_err("slot taken");
        assert!(matches!(err, ScriptError::Structure(_)));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn successors_record_parent() {
        let mut tree = ScriptTree::new(step("root"));
        let root = tree.root().expect("root");
        let a = tree.add_branch(root, 2, step("a")).expect("a");
        let node = tree.node(a).expect("node");
        assert_eq!(node.parent(), Some(root));
        assert_eq!(tree.node(root).expect("root").successor(2), Some(a));
        assert_eq!(tree.find_by_name("a"), Some(a));
    }
}
