//! Helpers for rendering human-readable component paths.

use crate::core::component::ComponentNode;
use crate::core::types::ComponentPath;
use crate::tree::ScriptTree;

/// Return the `/`-separated name path of `path`, e.g. `Measure/period`.
pub fn component_name_path(tree: &ScriptTree, path: &ComponentPath) -> Option<String> {
    let mut component = tree.component(path.node)?;
    let mut names = vec![component.name().to_string()];
    for depth in 0..path.items.len() {
        component = component.item(&path.items[depth..=depth])?;
        names.push(component.name().to_string());
    }
    Some(names.join("/"))
}

/// Resolve a `/`-separated name path back to a component address.
///
/// The first segment names a tree node; the remaining segments descend into
/// sheet items by name.
pub fn resolve_name_path(tree: &ScriptTree, name_path: &str) -> Option<ComponentPath> {
    let mut segments = name_path.split('/').filter(|segment| !segment.is_empty());
    let node = tree.find_by_name(segments.next()?)?;
    let mut component: &ComponentNode = tree.component(node)?;
    let mut items = Vec::new();
    for segment in segments {
        let index = (0..)
            .map_while(|index| component.item(&[index]).map(|item| (index, item)))
            .find(|(_, item)| item.name() == segment)
            .map(|(index, _)| index)?;
        items.push(index);
        component = component.item(&[index])?;
    }
    Some(ComponentPath { node, items })
}
