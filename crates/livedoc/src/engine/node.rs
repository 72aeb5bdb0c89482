use std::sync::Arc;

use indexmap::IndexMap;

use super::address::{ComponentId, Namespace};
use super::replacement::ReplacementRecord;
use super::state::StateRecord;
use crate::components::ComponentClass;
use crate::document::{ComponentSpec, Link};

/// A live component in the document tree.
#[derive(Debug)]
pub struct ComponentRecord {
    pub id: ComponentId,
    pub class: &'static ComponentClass,
    /// Namespace the component's own references resolve from.
    pub namespace: Namespace,
    /// Namespace its children are named in.
    pub child_namespace: Namespace,
    pub parent: Option<ComponentId>,
    pub spec: Arc<ComponentSpec>,
    /// Authored children; for composites only the internal ones.
    pub children: Vec<ComponentId>,
    /// Present exactly for composites.
    pub replacements: Option<ReplacementRecord>,
    pub states: IndexMap<Arc<str>, StateRecord>,
    pub link: Option<Link>,
}

impl ComponentRecord {
    pub fn is_composite(&self) -> bool {
        self.replacements.is_some()
    }

    pub fn state(&self, name: &str) -> Option<&StateRecord> {
        self.states.get(name)
    }

    pub fn state_mut(&mut self, name: &str) -> Option<&mut StateRecord> {
        self.states.get_mut(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.spec.attribute(name)
    }

    /// Fresh boolean state, false while stale or absent.
    pub fn flag(&self, name: &str) -> bool {
        self.state(name)
            .and_then(StateRecord::current)
            .is_some_and(|value| value.truthy())
    }

    /// Authored children followed by all replacement roots, withheld included.
    pub fn nested(&self) -> impl Iterator<Item = &ComponentId> {
        self.children.iter().chain(
            self.replacements
                .iter()
                .flat_map(|record| record.slots.iter().map(|slot| &slot.id)),
        )
    }

    #[cfg(test)]
    pub(crate) fn bare(id: ComponentId) -> Self {
        let namespace = id.namespace();
        Self {
            class: &crate::components::containers::PLACEHOLDER,
            spec: Arc::new(ComponentSpec::new("placeholder")),
            child_namespace: namespace.clone(),
            namespace,
            id,
            parent: None,
            children: Vec::new(),
            replacements: None,
            states: IndexMap::new(),
            link: None,
        }
    }
}
