//! Replacement engine: turns a composite's plan into live components.
//!
//! A composite never renders itself. Its `__replacements` state yields a
//! [`ReplacementPlan`]; integration diffs that plan against the roots it
//! created last time. With an unchanged key the longest prefix of equal
//! entry specs is kept together with all of its state. Everything after
//! that prefix is destroyed and rebuilt. A changed key rebuilds all roots.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::address::{ComponentId, StateKey};
use super::builder::{self, Reservations};
use super::error::EngineError;
use super::state::{REPLACEMENTS, STRUCTURE};
use super::store::Store;
use super::value::Value;
use crate::document::ComponentSpec;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementEntry {
    pub spec: ComponentSpec,
    /// Created and kept alive, but not part of the active output.
    pub withheld: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementPlan {
    /// Branch identity; a different key means nothing can be reused.
    pub key: Arc<str>,
    pub entries: Vec<ReplacementEntry>,
}

impl ReplacementPlan {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self {
            key: key.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, spec: ComponentSpec) {
        self.entries.push(ReplacementEntry {
            spec,
            withheld: false,
        });
    }

    pub fn push_withheld(&mut self, spec: ComponentSpec) {
        self.entries.push(ReplacementEntry {
            spec,
            withheld: true,
        });
    }

    pub fn extend(&mut self, specs: impl IntoIterator<Item = ComponentSpec>) {
        for spec in specs {
            self.push(spec);
        }
    }

    /// Applies an `assignNames` list. A blank name withholds that entry;
    /// names beyond the entries reserve withheld placeholders.
    pub fn assign_names(mut self, names: &[String]) -> Self {
        for (position, name) in names.iter().enumerate() {
            match self.entries.get_mut(position) {
                Some(entry) if name.is_empty() => entry.withheld = true,
                Some(entry) => entry.spec.name = Some(name.clone()),
                None if name.is_empty() => {}
                None => self.push_withheld(ComponentSpec::new("placeholder").named(name.as_str())),
            }
        }
        self
    }

    pub fn into_value(self) -> Value {
        Value::Subtree(Arc::new(self))
    }
}

/// One root created by a composite.
#[derive(Debug, Clone)]
pub struct ReplacementSlot {
    pub id: ComponentId,
    /// Plan entry the root was built from, before instantiation.
    pub spec: ComponentSpec,
    pub withheld: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReplacementRecord {
    pub key: Option<Arc<str>>,
    pub slots: Vec<ReplacementSlot>,
    pub applied: Option<Arc<ReplacementPlan>>,
    /// Last plan that could not be integrated; not retried until it changes.
    pub rejected: Option<Arc<ReplacementPlan>>,
}

impl ReplacementRecord {
    pub fn active_roots(&self) -> impl Iterator<Item = &ComponentId> {
        self.slots
            .iter()
            .filter(|slot| !slot.withheld)
            .map(|slot| &slot.id)
    }
}

pub(crate) enum PlanStatus {
    Pending,
    Failed(String),
    Ready(Arc<ReplacementPlan>),
}

pub(crate) fn plan_status(store: &Store, composite: &ComponentId) -> PlanStatus {
    let Some(state) = store
        .arena
        .get(composite)
        .and_then(|record| record.state(REPLACEMENTS))
    else {
        return PlanStatus::Failed("composite has no replacement rule".to_string());
    };
    if state.stale {
        return PlanStatus::Pending;
    }
    if let Some(error) = &state.error {
        return PlanStatus::Failed(error.to_string());
    }
    match &state.value {
        Value::Subtree(plan) => PlanStatus::Ready(plan.clone()),
        other => PlanStatus::Failed(format!(
            "expected a replacement plan, got {}",
            other.kind_name()
        )),
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum Integration {
    Unchanged,
    Applied,
    /// The previous roots were kept.
    Rejected(String),
}

pub(crate) fn integrate(
    store: &mut Store,
    composite: &ComponentId,
    plan: Arc<ReplacementPlan>,
) -> Result<Integration, EngineError> {
    let (namespace, kept, doomed) = {
        let Some(record) = store.arena.get(composite) else {
            return Ok(Integration::Unchanged);
        };
        let Some(current) = &record.replacements else {
            return Ok(Integration::Unchanged);
        };
        if current.applied.as_deref() == Some(&*plan) || current.rejected.as_deref() == Some(&*plan)
        {
            return Ok(Integration::Unchanged);
        }
        let kept = if current.key.as_deref() == Some(&*plan.key) {
            current
                .slots
                .iter()
                .zip(&plan.entries)
                .take_while(|(slot, entry)| slot.spec == entry.spec)
                .count()
        } else {
            0
        };
        let doomed: Vec<ComponentId> = current.slots[kept..]
            .iter()
            .map(|slot| slot.id.clone())
            .collect();
        (record.child_namespace.clone(), kept, doomed)
    };

    let released: FxHashSet<ComponentId> = doomed
        .iter()
        .flat_map(|id| builder::subtree(store, id))
        .collect();
    let mut reservations = Reservations::new(&released);
    let mut planned = Vec::with_capacity(plan.entries.len() - kept);
    for entry in &plan.entries[kept..] {
        match builder::plan(store, entry.spec.clone(), &namespace, &mut reservations) {
            Ok(subtree) => planned.push((subtree, entry)),
            Err(error) => {
                if let Some(current) = store
                    .arena
                    .get_mut(composite)
                    .and_then(|record| record.replacements.as_mut())
                {
                    current.rejected = Some(plan.clone());
                }
                return Ok(Integration::Rejected(error.to_string()));
            }
        }
    }

    for id in doomed.iter().rev() {
        builder::destroy(store, id);
    }
    let mut created = Vec::with_capacity(planned.len());
    for (subtree, entry) in planned {
        let id = builder::materialize(store, subtree, Some(composite.clone()))?;
        created.push(ReplacementSlot {
            id,
            spec: entry.spec.clone(),
            withheld: entry.withheld,
        });
    }

    let Some(current) = store
        .arena
        .get_mut(composite)
        .and_then(|record| record.replacements.as_mut())
    else {
        return Ok(Integration::Unchanged);
    };
    current.slots.truncate(kept);
    for (slot, entry) in current.slots.iter_mut().zip(&plan.entries) {
        slot.withheld = entry.withheld;
    }
    current.slots.extend(created);
    current.key = Some(plan.key.clone());
    current.applied = Some(plan.clone());
    current.rejected = None;
    let active: Vec<Value> = current
        .active_roots()
        .map(|id| Value::Component(id.clone()))
        .collect();

    log::debug!(
        "{composite}: kept {kept}, rebuilt {} of {} roots",
        plan.entries.len() - kept,
        plan.entries.len()
    );
    store.set_stored(&StateKey::new(composite.clone(), STRUCTURE), Value::list(active));
    Ok(Integration::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn assign_names_names_withholds_and_reserves() {
        let mut plan = ReplacementPlan::new("iterations");
        plan.push(ComponentSpec::new("iteration"));
        plan.push(ComponentSpec::new("iteration"));

        let plan = plan.assign_names(&names(&["a", "", "c"]));
        assert_eq!(plan.entries[0].spec.name.as_deref(), Some("a"));
        assert!(!plan.entries[0].withheld);
        assert_eq!(plan.entries[1].spec.name, None);
        assert!(plan.entries[1].withheld);
        assert_eq!(plan.entries[2].spec.kind, "placeholder");
        assert_eq!(plan.entries[2].spec.name.as_deref(), Some("c"));
        assert!(plan.entries[2].withheld);
    }

    #[test]
    fn active_roots_skip_withheld() {
        let slot = |id: &str, withheld| ReplacementSlot {
            id: ComponentId::from(id),
            spec: ComponentSpec::new("p"),
            withheld,
        };
        let record = ReplacementRecord {
            slots: vec![slot("/a", false), slot("/b", true), slot("/c", false)],
            ..ReplacementRecord::default()
        };
        let active: Vec<&str> = record.active_roots().map(ComponentId::as_str).collect();
        assert_eq!(active, vec!["/a", "/c"]);
    }
}
