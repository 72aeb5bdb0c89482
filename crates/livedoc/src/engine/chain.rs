//! Chaining bindings: actions fired as a consequence of other actions,
//! conditions or raw interactions.
//!
//! Bindings are plain attributes on the downstream component. A fired
//! binding always requests the downstream's default action, as an
//! internal request, so read-only documents still run their chains.

use super::action::{ActionRequest, Interaction, InteractionKind};
use super::address::{ComponentId, StateKey};
use super::error::EvalIssue;
use super::state::TRIGGER_CONDITION;
use super::store::Store;
use crate::expr::RefPath;

/// Cascade-after: names of upstream components.
pub const TRIGGER_WITH: &str = "triggerWith";
/// Condition gate: fires on each false to true transition.
pub const TRIGGER_WHEN: &str = "triggerWhen";
pub const TRIGGER_WHEN_CLICKED: &str = "triggerWhenObjectsClicked";
pub const TRIGGER_WHEN_FOCUSED: &str = "triggerWhenObjectsFocused";

fn default_request(store: &Store, id: &ComponentId) -> Option<ActionRequest> {
    let action = store.arena.get(id)?.class.default_action?;
    Some(ActionRequest::new(id.as_str(), action).internal())
}

/// Whether any name in `attribute` of `id` resolves to `upstream`.
fn names_resolve_to(store: &Store, id: &ComponentId, attribute: &str, upstream: &ComponentId) -> bool {
    let Some(record) = store.arena.get(id) else {
        return false;
    };
    let names = record.spec.list_attribute(attribute);
    names.iter().filter_map(|name| RefPath::parse(name)).any(|path| {
        store.resolve_untracked(&path, &record.namespace).as_ref() == Some(upstream)
    })
}

/// Cascade-after requests for components bound to `upstream`, in document
/// order. A component with a condition gate ignores its cascade list.
pub(crate) fn cascade_requests(
    store: &Store,
    order: &[ComponentId],
    upstream: &ComponentId,
) -> Vec<ActionRequest> {
    order
        .iter()
        .filter(|id| {
            store.arena.get(id).is_some_and(|record| {
                record.attribute(TRIGGER_WITH).is_some() && record.attribute(TRIGGER_WHEN).is_none()
            })
        })
        .filter(|id| names_resolve_to(store, id, TRIGGER_WITH, upstream))
        .filter_map(|id| default_request(store, id))
        .collect()
}

/// Requests for condition gates that turned true since they were last
/// observed. The first observation of a gate only records its baseline, and
/// a pending condition is not observed at all.
pub(crate) fn condition_requests(store: &mut Store, order: &[ComponentId]) -> Vec<ActionRequest> {
    let mut requests = Vec::new();
    for id in order {
        let has_gate = store
            .arena
            .get(id)
            .is_some_and(|record| record.states.contains_key(TRIGGER_CONDITION));
        if !has_gate {
            continue;
        }
        let now = match store.get_value(&StateKey::new(id.clone(), TRIGGER_CONDITION)) {
            Ok(value) => value.truthy(),
            Err(EvalIssue::Pending) => continue,
            Err(_) => false,
        };
        let before = store.gate_memory.insert(id.clone(), now);
        if before == Some(false) && now {
            log::debug!("condition gate of {id} turned true");
            requests.extend(default_request(store, id));
        }
    }
    requests
}

/// Requests for components gated on interactions with `target`.
pub(crate) fn interaction_requests(
    store: &Store,
    order: &[ComponentId],
    target: &ComponentId,
    interaction: &Interaction,
) -> Vec<ActionRequest> {
    let attribute = match interaction.kind {
        InteractionKind::Click => TRIGGER_WHEN_CLICKED,
        InteractionKind::Focus => TRIGGER_WHEN_FOCUSED,
    };
    order
        .iter()
        .filter(|id| names_resolve_to(store, id, attribute, target))
        .filter_map(|id| default_request(store, id))
        .map(|mut request| {
            request.event = Some(interaction.clone());
            request
        })
        .collect()
}
