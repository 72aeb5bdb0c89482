//! Creation and destruction of component records.
//!
//! Creation is two-step: `plan` assigns ids and checks names for a whole
//! subtree without touching the arena, `materialize` then inserts it. A
//! replacement that would collide fails in the first step and leaves the
//! document untouched.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use super::address::{ComponentId, DepKey, Namespace, StateKey};
use super::error::EngineError;
use super::node::ComponentRecord;
use super::replacement::ReplacementRecord;
use super::state::{Rule, STRUCTURE, StateDef, StateRecord};
use super::store::Store;
use super::value::Value;
use crate::components::{self, ComponentClass};
use crate::document::{ComponentSpec, Link, expand_children};
use crate::expr::ast::is_identifier;

/// Subtree with ids assigned, ready to insert.
pub(crate) struct Planned {
    pub id: ComponentId,
    pub namespace: Namespace,
    pub child_namespace: Namespace,
    pub class: &'static ComponentClass,
    pub spec: Arc<ComponentSpec>,
    pub children: Vec<Planned>,
}

/// Ids claimed by the batch being planned, and ids about to be destroyed.
pub(crate) struct Reservations<'r> {
    reserved: FxHashSet<ComponentId>,
    released: &'r FxHashSet<ComponentId>,
}

impl<'r> Reservations<'r> {
    pub fn new(released: &'r FxHashSet<ComponentId>) -> Self {
        Self {
            reserved: FxHashSet::default(),
            released,
        }
    }

    fn taken(&self, store: &Store, id: &ComponentId) -> bool {
        self.reserved.contains(id) || (store.arena.contains(id) && !self.released.contains(id))
    }
}

pub(crate) fn plan(
    store: &mut Store,
    spec: ComponentSpec,
    namespace: &Namespace,
    reservations: &mut Reservations<'_>,
) -> Result<Planned, EngineError> {
    let class = store
        .registry
        .get(&spec.kind)
        .ok_or_else(|| EngineError::UnknownComponentType {
            kind: spec.kind.clone(),
        })?;

    let id = match &spec.name {
        Some(name) => {
            if !is_identifier(name) {
                return Err(EngineError::InvalidName { name: name.clone() });
            }
            let id = namespace.join(name);
            if reservations.taken(store, &id) {
                return Err(EngineError::DuplicateName { id });
            }
            id
        }
        None => loop {
            let name = store.arena.next_auto_name(namespace, class.name);
            let id = namespace.join(&name);
            if !reservations.taken(store, &id) {
                break id;
            }
        },
    };
    reservations.reserved.insert(id.clone());

    let opens = class.opens_namespace
        || spec
            .attribute("newNamespace")
            .is_some_and(|flag| flag.trim().eq_ignore_ascii_case("true"));
    let child_namespace = if opens {
        id.as_namespace()
    } else {
        namespace.clone()
    };

    let child_specs: Vec<ComponentSpec> = if class.composite {
        spec.component_children()
            .filter(|child| (class.keeps_child)(child))
            .cloned()
            .collect()
    } else {
        expand_children(&spec.children)
    };
    let children = child_specs
        .into_iter()
        .map(|child| plan(store, child, &child_namespace, reservations))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Planned {
        id,
        namespace: namespace.clone(),
        child_namespace,
        class,
        spec: Arc::new(spec),
        children,
    })
}

pub(crate) fn materialize(
    store: &mut Store,
    planned: Planned,
    parent: Option<ComponentId>,
) -> Result<ComponentId, EngineError> {
    let Planned {
        id,
        namespace,
        child_namespace,
        class,
        spec,
        children,
    } = planned;

    let mut defs = components::common_states(&spec);
    let mut class_defs = (class.states)(&spec);
    match &spec.link {
        Some(Link::Component(source)) => {
            for def in class_defs.iter_mut().filter(|def| !def.name.starts_with("__")) {
                def.rule = Rule::Link(StateKey::new(source.clone(), &def.name));
            }
        }
        Some(Link::State(key)) => {
            let primary = class
                .primary_state
                .and_then(|primary| class_defs.iter_mut().find(|def| &*def.name == primary));
            if let Some(def) = primary {
                def.rule = Rule::Link(key.clone());
                def.writable = true;
            }
        }
        None => {}
    }
    defs.extend(class_defs);
    if class.composite {
        defs.push(StateDef::constant(STRUCTURE, Value::list([])));
    }

    let states: IndexMap<Arc<str>, StateRecord> = defs
        .into_iter()
        .map(|def| (def.name.clone(), StateRecord::from(def)))
        .collect();
    let keys: Vec<StateKey> = states
        .keys()
        .map(|name| StateKey::new(id.clone(), name))
        .collect();

    let record = ComponentRecord {
        id: id.clone(),
        class,
        namespace,
        child_namespace,
        parent,
        link: spec.link.clone(),
        spec,
        children: children.iter().map(|child| child.id.clone()).collect(),
        replacements: class.composite.then(ReplacementRecord::default),
        states,
    };
    store.arena.insert(record)?;
    log::trace!("created {id} ({})", class.name);

    // Wake readers that probed for this id or its states while it was absent
    store.mark_stale(&DepKey::Exists(id.clone()));
    for key in keys {
        store.mark_stale(&DepKey::State(key));
    }

    for child in children {
        materialize(store, child, Some(id.clone()))?;
    }
    Ok(id)
}

/// Places a whole document under the root namespace.
pub(crate) fn instantiate_root(
    store: &mut Store,
    spec: ComponentSpec,
) -> Result<ComponentId, EngineError> {
    let released = FxHashSet::default();
    let mut reservations = Reservations::new(&released);
    let planned = plan(store, spec, &Namespace::root(), &mut reservations)?;
    let root = materialize(store, planned, None)?;
    store.root = Some(root.clone());
    Ok(root)
}

/// Removes a component and everything below it, waking all readers.
pub(crate) fn destroy(store: &mut Store, id: &ComponentId) {
    let Some(nested) = store
        .arena
        .get(id)
        .map(|record| record.nested().cloned().collect::<Vec<_>>())
    else {
        return;
    };
    for child in nested.iter().rev() {
        destroy(store, child);
    }

    let keys: Vec<StateKey> = store
        .arena
        .get(id)
        .map(|record| {
            record
                .states
                .keys()
                .map(|name| StateKey::new(id.clone(), name))
                .collect()
        })
        .unwrap_or_default();
    for key in &keys {
        store.graph.clear_producers(key);
        store.mark_stale(&DepKey::State(key.clone()));
    }
    store.arena.remove(id);
    store.gate_memory.remove(id);
    store.mark_stale(&DepKey::Exists(id.clone()));
    log::trace!("destroyed {id}");
}

/// Ids of a component and all of its nested components.
pub(crate) fn subtree(store: &Store, id: &ComponentId) -> Vec<ComponentId> {
    let mut out = Vec::new();
    let mut stack = vec![id.clone()];
    while let Some(current) = stack.pop() {
        if let Some(record) = store.arena.get(&current) {
            stack.extend(record.nested().cloned());
            out.push(current);
        }
    }
    out
}
