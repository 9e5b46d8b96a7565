//! Ordered group of sibling components with an "all done" reduction.

use crate::core::bundle::Bundle;
use crate::core::component::ComponentNode;
use crate::core::error::ScriptError;

/// Sibling components owned by a composite (a sheet).
///
/// The owner learns about completion through the return value of
/// [`ComponentContainer::update`]: whenever a child's state actually changes
/// the freshly reduced "all done" flag is reported back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentContainer {
    items: Vec<ComponentNode>,
}

impl ComponentContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ComponentNode) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ComponentNode> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentNode> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentNode> {
        self.items.iter_mut()
    }

    /// True iff the container is non-empty and every item is complete.
    pub fn all_done(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.state().is_done())
    }

    /// Run `f` on item `index`.
    ///
    /// Returns `Some(all_done)` if the item's state changed, `None` otherwise.
    pub fn update<F>(&mut self, index: usize, f: F) -> Result<Option<bool>, ScriptError>
    where
        F: FnOnce(&mut ComponentNode) -> Result<(), ScriptError>,
    {
        let item = self
            .items
            .get_mut(index)
            .ok_or_else(|| ScriptError::UnknownComponent(format!("item {index}")))?;
        let before = item.state();
        f(item)?;
        if item.state() == before {
            return Ok(None);
        }
        Ok(Some(self.all_done()))
    }

    /// Check items in order, stopping at the first failure.
    pub fn init_check(&self) -> Result<(), ScriptError> {
        self.items.iter().try_for_each(ComponentNode::init_check)
    }

    /// Store each item's state under its positional key (`"0"`, `"1"`, ...).
    pub fn to_bundle(&self, bundle: &mut Bundle) {
        for (index, item) in self.items.iter().enumerate() {
            let mut item_bundle = Bundle::new();
            item.to_bundle(&mut item_bundle);
            bundle.put_bundle(index.to_string(), item_bundle);
        }
    }

    pub fn from_bundle(&mut self, bundle: &Bundle) -> Result<(), ScriptError> {
        for (index, item) in self.items.iter_mut().enumerate() {
            let key = index.to_string();
            let item_bundle = bundle.get_bundle(&key).ok_or_else(|| {
                ScriptError::UnknownComponent(format!(
                    "\"{}\" (no saved state for item {index})",
                    item.name()
                ))
            })?;
            item.from_bundle(item_bundle)?;
        }
        Ok(())
    }
}
