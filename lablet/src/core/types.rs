//! Shared types for addressing components and reporting state changes.

use std::fmt;
use std::path::PathBuf;

use crate::core::state::ComponentState;
use crate::tree::NodeId;

/// Address of a component: a tree node plus the item indices leading into
/// nested sheets. An empty `items` addresses the tree node itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentPath {
    pub node: NodeId,
    pub items: Vec<usize>,
}

impl ComponentPath {
    pub fn node(node: NodeId) -> Self {
        Self {
            node,
            items: Vec::new(),
        }
    }

    pub fn item(node: NodeId, items: impl Into<Vec<usize>>) -> Self {
        Self {
            node,
            items: items.into(),
        }
    }

    pub fn is_node(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)?;
        for index in &self.items {
            write!(f, ".{index}")?;
        }
        Ok(())
    }
}

/// A state transition that actually happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub component: ComponentPath,
    pub state: ComponentState,
}

/// Learner or scripted input applied to a single component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// Tick or untick a checkbox question.
    SetChecked(bool),
    /// Replace the answer of a text question.
    SetAnswer(String),
    /// Mark a text question optional (complete without an answer).
    SetOptional(bool),
    /// Attach a recorded experiment, relative to the run directory.
    RecordExperiment(PathBuf),
    /// Scripted override of the completion state.
    SetState(ComponentState),
}

impl Interaction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetChecked(_) => "set-checked",
            Self::SetAnswer(_) => "set-answer",
            Self::SetOptional(_) => "set-optional",
            Self::RecordExperiment(_) => "record-experiment",
            Self::SetState(_) => "set-state",
        }
    }
}

/// A state change relative to the component an interaction was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemChange {
    pub items: Vec<usize>,
    pub state: ComponentState,
}
