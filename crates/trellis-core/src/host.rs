//! The host environment interface and property diffing.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::HostError;
use crate::id::HostHandle;
use crate::node::Props;
use crate::value::{Value, ValueMap};

/// One changed property. `value: None` means the property was removed.
#[derive(Clone, Debug, PartialEq)]
pub struct PropChange {
    /// Property name.
    pub name: Arc<str>,
    /// New value, or `None` when removed.
    pub value: Option<Value>,
}

/// The set of property changes computed for a host element during
/// render and applied during commit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdatePayload(SmallVec<[PropChange; 4]>);

impl UpdatePayload {
    /// An empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one change.
    pub fn push(&mut self, name: Arc<str>, value: Option<Value>) {
        self.0.push(PropChange { name, value });
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the changes in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &PropChange> {
        self.0.iter()
    }

    /// Look up the change for one property.
    pub fn get(&self, name: &str) -> Option<&PropChange> {
        self.0.iter().find(|c| &*c.name == name)
    }
}

/// Compute the attribute changes between two attribute maps.
///
/// Removed keys are reported first, in `old` order, followed by added or
/// changed keys in `new` order.
pub fn diff_properties(old: &ValueMap, new: &ValueMap) -> UpdatePayload {
    let mut payload = UpdatePayload::new();
    for name in old.keys() {
        if !new.contains_key(name) {
            payload.push(name.clone(), None);
        }
    }
    for (name, value) in new {
        if old.get(name) != Some(value) {
            payload.push(name.clone(), Some(value.clone()));
        }
    }
    payload
}

/// Operations the engine needs from the environment that owns the real
/// nodes (a DOM, a terminal buffer, a native widget tree).
///
/// Creation and `prepare_update` run during the render phase and must
/// not mutate anything the user can observe. All other mutations run
/// during commit. A failed mutation aborts the commit and disables the
/// root, so implementations should only fail on genuine invariant
/// violations.
pub trait HostConfig {
    /// Create a detached host element.
    fn create_instance(&mut self, element_type: &str, props: &Props) -> Result<HostHandle, HostError>;

    /// Create a detached text node.
    fn create_text_instance(&mut self, text: &str) -> Result<HostHandle, HostError>;

    /// Append a child to an element that is not yet attached.
    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        self.append_child(parent, child)
    }

    /// Called once a new element has all of its initial children.
    fn finalize_initial_children(
        &mut self,
        _instance: HostHandle,
        _element_type: &str,
        _props: &Props,
    ) -> Result<(), HostError> {
        Ok(())
    }

    /// Whether the element renders its children as direct text content
    /// instead of child nodes.
    fn should_set_text_content(&self, _element_type: &str, _props: &Props) -> bool {
        false
    }

    /// Compute the changes needed to move `instance` from `old_props` to
    /// `new_props`. `None` means nothing to apply.
    fn prepare_update(
        &self,
        _instance: HostHandle,
        element_type: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<UpdatePayload> {
        let mut payload = diff_properties(old_props.attributes(), new_props.attributes());
        if self.should_set_text_content(element_type, new_props) {
            let old_text = old_props.text_content();
            let new_text = new_props.text_content();
            if old_text != new_text {
                payload.push(Arc::from("children"), new_text.map(Value::from));
            }
        }
        (!payload.is_empty()).then_some(payload)
    }

    /// Append `child` as the last child of `parent`, moving it if it is
    /// already attached.
    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Insert `child` before `before` under `parent`, moving it if it is
    /// already attached.
    fn insert_before(
        &mut self,
        parent: HostHandle,
        child: HostHandle,
        before: HostHandle,
    ) -> Result<(), HostError>;

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Apply a payload produced by [`HostConfig::prepare_update`].
    fn commit_update(
        &mut self,
        instance: HostHandle,
        payload: &UpdatePayload,
        element_type: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Result<(), HostError>;

    /// Replace the content of a text node.
    fn commit_text_update(
        &mut self,
        instance: HostHandle,
        old_text: &str,
        new_text: &str,
    ) -> Result<(), HostError>;

    /// Clear text content previously set directly on an element.
    fn reset_text_content(&mut self, _instance: HostHandle) -> Result<(), HostError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::value_map;

    #[test]
    fn diff_reports_removed_then_changed() {
        let old = value_map([("a", 1), ("b", 2), ("c", 3)]);
        let new = value_map([("a", 1), ("c", 4), ("d", 5)]);
        let payload = diff_properties(&old, &new);
        let names: Vec<&str> = payload.iter().map(|c| &*c.name).collect();
        assert_eq!(names, ["b", "c", "d"]);
        assert_eq!(payload.get("b").and_then(|c| c.value.clone()), None);
        assert_eq!(payload.get("c").and_then(|c| c.value.clone()), Some(Value::from(4)));
    }

    #[test]
    fn diff_of_equal_maps_is_empty() {
        let a = value_map([("x", "y")]);
        assert!(diff_properties(&a, &a.clone()).is_empty());
    }
}
