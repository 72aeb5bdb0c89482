//! Settled view of the document for hosts and tests.

use indexmap::IndexMap;
use serde::Serialize;

use super::address::{ComponentId, StateKey};
use super::state::HIDE;
use super::store::Store;
use super::tracker::Tracker;
use super::value::Value;

/// Every component with its public state, in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSnapshot {
    /// Version for format changes
    pub version: u32,
    pub root: Option<ComponentId>,
    pub components: IndexMap<ComponentId, ComponentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub state: IndexMap<String, Value>,
    pub hidden: bool,
    /// Rendered children, composites expanded and hidden ones left out.
    pub active_children: Vec<ComponentId>,
    /// Composites only: every replacement root, withheld ones included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacements: Option<Vec<ReplacementSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementSnapshot {
    pub id: ComponentId,
    pub withheld: bool,
}

impl DocumentSnapshot {
    pub const VERSION: u32 = 1;

    pub(crate) fn capture(store: &mut Store) -> Self {
        let mut components = IndexMap::new();
        for id in store.document_order() {
            let Some((kind, names, replacements)) = store.arena.get(&id).map(|record| {
                let names: Vec<String> = record
                    .states
                    .iter()
                    .filter(|(_, state)| state.public)
                    .map(|(name, _)| name.to_string())
                    .collect();
                let replacements = record.replacements.as_ref().map(|replacements| {
                    replacements
                        .slots
                        .iter()
                        .map(|slot| ReplacementSnapshot {
                            id: slot.id.clone(),
                            withheld: slot.withheld,
                        })
                        .collect()
                });
                (record.class.name.to_string(), names, replacements)
            }) else {
                continue;
            };

            let mut state = IndexMap::with_capacity(names.len());
            for name in names {
                let value = store.read(&StateKey::new(id.clone(), &name));
                state.insert(name, value);
            }
            let hidden = store.read(&StateKey::new(id.clone(), HIDE)).truthy();
            let active_children = Tracker::untracked(store, id.clone())
                .visible_children(&id)
                .unwrap_or_default();

            components.insert(
                id,
                ComponentSnapshot {
                    kind,
                    state,
                    hidden,
                    active_children,
                    replacements,
                },
            );
        }
        Self {
            version: Self::VERSION,
            root: store.root.clone(),
            components,
        }
    }

    pub fn component(&self, id: &str) -> Option<&ComponentSnapshot> {
        self.components.get(&ComponentId::from(id))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
