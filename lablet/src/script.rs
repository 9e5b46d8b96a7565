//! The script aggregate: a loaded component tree plus its run-time services.
//!
//! A [`Script`] owns its [`ScriptTree`] exclusively. Every operation records
//! the display text of its failure in [`Script::last_error`] in addition to
//! returning the error, so a host can show it after the fact.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::core::active_chain::{active_chain, is_complete};
use crate::core::bundle::Bundle;
use crate::core::error::ScriptError;
use crate::core::init_check::check_tree;
use crate::core::persistence::{restore_tree_state, save_tree_state};
use crate::core::state::ComponentState;
use crate::core::types::{ComponentPath, Interaction, StateChange};
use crate::tree::{NodeId, ScriptTree};

/// `strftime` pattern of the timestamp part of a script uid.
pub const SCRIPT_UID_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Observer of component state transitions.
///
/// Called synchronously after the triggering operation has finished mutating
/// the tree, once per actual change.
pub trait ScriptListener {
    fn on_component_state_changed(&mut self, tree: &ScriptTree, change: &StateChange);
}

impl<F> ScriptListener for F
where
    F: FnMut(&ScriptTree, &StateChange),
{
    fn on_component_state_changed(&mut self, tree: &ScriptTree, change: &StateChange) {
        self(tree, change);
    }
}

struct Registration {
    id: u64,
    listener: Box<dyn ScriptListener>,
}

#[derive(Default)]
struct ListenerSlot {
    next_id: u64,
    current: Option<Registration>,
}

/// Scoped listener registration returned by [`Script::subscribe`].
///
/// Dropping it unregisters the listener, unless another listener has
/// replaced it in the meantime.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct Subscription {
    slot: Weak<RefCell<ListenerSlot>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.borrow_mut();
        if slot.current.as_ref().is_some_and(|current| current.id == self.id) {
            slot.current = None;
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A loaded (or not yet loaded) lab activity.
#[derive(Default)]
pub struct Script {
    tree: ScriptTree,
    title: String,
    user_data_dir: Option<PathBuf>,
    last_error: String,
    listener: Rc<RefCell<ListenerSlot>>,
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("title", &self.title)
            .field("nodes", &self.tree.len())
            .field("user_data_dir", &self.user_data_dir)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl Script {
    pub fn new(title: impl Into<String>, tree: ScriptTree) -> Self {
        Self {
            tree,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.tree.is_empty()
    }

    pub fn tree(&self) -> &ScriptTree {
        &self.tree
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Directory holding this run's state file and artifacts.
    pub fn user_data_dir(&self) -> Option<&Path> {
        self.user_data_dir.as_deref()
    }

    pub fn set_user_data_dir(&mut self, dir: impl Into<PathBuf>) {
        self.user_data_dir = Some(dir.into());
    }

    /// Display text of the most recent failure, empty if none occurred.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Register the single listener, replacing any previous one.
    pub fn subscribe(&self, listener: impl ScriptListener + 'static) -> Subscription {
        let mut slot = self.listener.borrow_mut();
        slot.next_id += 1;
        let id = slot.next_id;
        slot.current = Some(Registration {
            id,
            listener: Box::new(listener),
        });
        Subscription {
            slot: Rc::downgrade(&self.listener),
            id,
        }
    }

    /// Check every component, stopping at the first misconfigured one.
    pub fn init_check(&mut self) -> Result<(), ScriptError> {
        let result = check_tree(&self.tree);
        self.record(result)
    }

    /// Move the root from inactive to ongoing.
    ///
    /// Returns false if the script is not loaded or the root is already past
    /// the ongoing state.
    pub fn start(&mut self) -> bool {
        let Some(root) = self.tree.root() else {
            return false;
        };
        let Some(component) = self.tree.component_mut(root) else {
            return false;
        };
        if component.state() > ComponentState::Ongoing {
            return false;
        }
        if component.set_state(ComponentState::Ongoing) {
            self.notify(&[StateChange {
                component: ComponentPath::node(root),
                state: ComponentState::Ongoing,
            }]);
        }
        true
    }

    pub fn active_chain(&self) -> Vec<NodeId> {
        active_chain(&self.tree)
    }

    /// True if the learner has reached the end of the chain.
    pub fn is_complete(&self) -> bool {
        is_complete(&self.tree, &self.active_chain())
    }

    /// Scripted state override for the component at `path`.
    pub fn set_state(
        &mut self,
        path: &ComponentPath,
        state: ComponentState,
    ) -> Result<Vec<StateChange>, ScriptError> {
        self.interact(path, Interaction::SetState(state))
    }

    /// Apply `interaction` to the component at `path`.
    ///
    /// Returns every state change it caused, innermost component first; the
    /// listener sees the same changes in the same order. An interaction that
    /// changes nothing reports nothing.
    pub fn interact(
        &mut self,
        path: &ComponentPath,
        interaction: Interaction,
    ) -> Result<Vec<StateChange>, ScriptError> {
        let result = self.apply(path, &interaction);
        let changes = self.record(result)?;
        for change in &changes {
            debug!(component = %change.component, state = %change.state, "component state changed");
        }
        self.notify(&changes);
        Ok(changes)
    }

    fn apply(
        &mut self,
        path: &ComponentPath,
        interaction: &Interaction,
    ) -> Result<Vec<StateChange>, ScriptError> {
        if !self.is_loaded() {
            return Err(ScriptError::NotLoaded);
        }
        let component = self
            .tree
            .component_mut(path.node)
            .ok_or_else(|| ScriptError::UnknownComponent(path.to_string()))?;
        let mut item_changes = Vec::new();
        component.apply(&path.items, interaction, &mut item_changes)?;

        Ok(item_changes
            .into_iter()
            .map(|change| StateChange {
                component: ComponentPath::item(path.node, change.items),
                state: change.state,
            })
            .collect())
    }

    /// Write the tree fingerprint and every component's state into `bundle`.
    pub fn save_state(&mut self, bundle: &mut Bundle) -> Result<(), ScriptError> {
        let result = save_tree_state(&self.tree, bundle);
        self.record(result)
    }

    /// Restore component states from `bundle`, all or nothing.
    ///
    /// On failure the tree is left exactly as it was.
    pub fn load_state(&mut self, bundle: &Bundle) -> Result<(), ScriptError> {
        let result = restore_tree_state(&self.tree, bundle);
        match self.record(result) {
            Ok(restored) => {
                self.tree = restored;
                info!(title = %self.title, "script state restored");
                Ok(())
            }
            Err(err) => {
                warn!(title = %self.title, error = %err, "script state rejected");
                Err(err)
            }
        }
    }

    fn record<T>(&mut self, result: Result<T, ScriptError>) -> Result<T, ScriptError> {
        if let Err(err) = &result {
            self.last_error = err.to_string();
        }
        result
    }

    fn notify(&self, changes: &[StateChange]) {
        if changes.is_empty() {
            return;
        }
        let mut slot = self.listener.borrow_mut();
        let Some(registration) = slot.current.as_mut() else {
            return;
        };
        for change in changes {
            registration
                .listener
                .on_component_state_changed(&self.tree, change);
        }
    }
}

/// Unique, sortable run id: the local time plus `seed`.
pub fn generate_script_uid(seed: &str) -> String {
    generate_script_uid_at(seed, Local::now().naive_local())
}

/// [`generate_script_uid`] for a fixed point in time.
pub fn generate_script_uid_at(seed: &str, time: NaiveDateTime) -> String {
    let stamp = time.format(SCRIPT_UID_TIME_FORMAT).to_string();
    if seed.is_empty() {
        stamp
    } else {
        format!("{stamp}_{seed}")
    }
}
