//! Test-only helpers for building script trees and observing scripts.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use tempfile::TempDir;

use crate::core::component::ComponentNode;
use crate::core::state::ComponentState;
use crate::core::types::StateChange;
use crate::script::ScriptListener;
use crate::tree::{NodeId, ScriptTree};

/// Declarative source of a small pendulum lab used across tests.
pub const PENDULUM_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/pendulum.json"
));

/// Chain of checkbox steps `names[0] -> names[1] -> ...`, all ongoing.
pub fn linear_tree(names: &[&str]) -> (ScriptTree, Vec<NodeId>) {
    let mut names = names.iter();
    let first = names.next().copied().unwrap_or("root");
    let mut tree = ScriptTree::new(step(first));
    let mut ids = Vec::new();
    let mut last = tree.root().expect("root exists");
    ids.push(last);
    for name in names {
        last = tree.add_next(last, step(name)).expect("add step");
        ids.push(last);
    }
    (tree, ids)
}

fn step(name: &str) -> ComponentNode {
    ComponentNode::checkbox(name, format!("{name} done?"))
}

/// Force the state of a tree node, bypassing interactions.
pub fn set_node_state(tree: &mut ScriptTree, id: NodeId, state: ComponentState) {
    tree.component_mut(id)
        .expect("node exists")
        .set_state(state);
}

/// Listener that records every change it sees. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    changes: Rc<RefCell<Vec<StateChange>>>,
}

impl RecordingListener {
    pub fn changes(&self) -> Vec<StateChange> {
        self.changes.borrow().clone()
    }
}

impl ScriptListener for RecordingListener {
    fn on_component_state_changed(&mut self, _tree: &ScriptTree, change: &StateChange) {
        self.changes.borrow_mut().push(change.clone());
    }
}

/// Temp directory holding `pendulum.json`; returns the directory and the
/// script path.
pub fn pendulum_fixture() -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("pendulum.json");
    fs::write(&path, PENDULUM_SCRIPT).expect("write fixture");
    (temp, path)
}
