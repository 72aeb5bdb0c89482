//! Action requests and their dispatch.
//!
//! Handlers never write. They read through an [`ActionContext`] and return
//! an [`ActionEffect`]; the coordinator validates and applies its writes as
//! one batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::address::{ComponentId, StateKey};
use super::error::{EvalResult, Rejection};
use super::state::DISABLED;
use super::store::Store;
use super::tracker::Tracker;
use super::value::Value;
use crate::components::ComponentClass;
use crate::document::ComponentSpec;
use crate::expr::{RefPath, Reference, parse_reference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    /// From the host: a learner's input or a script.
    External,
    /// Fired by a chaining binding or another action.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    /// Absolute id, or a path resolved from the root namespace.
    pub target: String,
    pub action: String,
    pub args: BTreeMap<String, Value>,
    pub source: RequestSource,
    /// Interaction that caused the request, for interaction gates.
    pub event: Option<Interaction>,
}

impl ActionRequest {
    pub fn new(target: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            action: action.into(),
            args: BTreeMap::new(),
            source: RequestSource::External,
            event: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn internal(mut self) -> Self {
        self.source = RequestSource::Internal;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Click,
    Focus,
}

/// A learner clicked or focused a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub target: String,
    pub kind: InteractionKind,
}

impl Interaction {
    pub fn click(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: InteractionKind::Click,
        }
    }

    pub fn focus(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: InteractionKind::Focus,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    pub key: StateKey,
    pub value: Value,
}

/// What a handler wants done.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionEffect {
    pub writes: Vec<StateWrite>,
    /// Requests queued after this action, before cascades.
    pub follow_ups: Vec<ActionRequest>,
}

impl ActionEffect {
    pub fn write(key: StateKey, value: Value) -> Self {
        Self {
            writes: vec![StateWrite { key, value }],
            follow_ups: Vec::new(),
        }
    }
}

pub type ActionHandler = fn(&mut ActionContext<'_>) -> Result<ActionEffect, Rejection>;

pub struct ActionDef {
    pub name: &'static str,
    pub handler: ActionHandler,
}

/// Read-only view handed to action handlers.
pub struct ActionContext<'a> {
    store: &'a mut Store,
    target: ComponentId,
    args: &'a BTreeMap<String, Value>,
}

impl<'a> ActionContext<'a> {
    pub fn target(&self) -> &ComponentId {
        &self.target
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    pub fn require_arg(&self, name: &str) -> Result<&Value, Rejection> {
        self.arg(name)
            .ok_or_else(|| Rejection::HandlerFailed(format!("missing argument `{name}`")))
    }

    pub fn class_of(&self, id: &ComponentId) -> Option<&'static ComponentClass> {
        self.store.arena.get(id).map(|record| record.class)
    }

    pub fn spec_of(&self, id: &ComponentId) -> Option<Arc<ComponentSpec>> {
        self.store.arena.get(id).map(|record| record.spec.clone())
    }

    pub fn attribute_of(&self, id: &ComponentId, name: &str) -> Option<String> {
        self.store
            .arena
            .get(id)
            .and_then(|record| record.attribute(name))
            .map(str::to_string)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attribute_of(&self.target, name)
    }

    /// Current value; anything unresolved reads as Undefined.
    pub fn value(&mut self, id: &ComponentId, state: &str) -> Value {
        self.store.read(&StateKey::new(id.clone(), state))
    }

    pub fn own(&mut self, state: &str) -> Value {
        let target = self.target.clone();
        self.value(&target, state)
    }

    pub fn own_key(&self, state: &str) -> StateKey {
        StateKey::new(self.target.clone(), state)
    }

    /// Runs reads as if from `subject`, without recording dependencies.
    pub fn with_tracker<R>(
        &mut self,
        subject: &ComponentId,
        read: impl FnOnce(&mut Tracker<'_>) -> EvalResult<R>,
    ) -> Option<R> {
        let mut tracker = Tracker::untracked(self.store, subject.clone());
        read(&mut tracker).ok()
    }

    /// Evaluates an attribute of `id` in that component's namespace.
    pub fn eval_attribute_of(&mut self, id: &ComponentId, name: &str) -> Value {
        let Some(source) = self.attribute_of(id, name) else {
            return Value::Undefined;
        };
        self.with_tracker(id, |tracker| tracker.eval_source(&source))
            .unwrap_or_default()
    }

    pub fn active_children(&mut self, id: &ComponentId) -> Vec<ComponentId> {
        self.with_tracker(id, |tracker| tracker.active_children(id))
            .unwrap_or_default()
    }

    /// Resolves a component path written on `from`.
    pub fn resolve_component(&mut self, from: &ComponentId, path: &str) -> Option<ComponentId> {
        let namespace = self.store.arena.get(from)?.namespace.clone();
        let path = RefPath::parse(path)?;
        self.store.resolve_untracked(&path, &namespace)
    }

    /// State named by a reference attribute of `from`, such as
    /// `target="$n"` or `target="p.x"`. A bare component means its primary
    /// state.
    pub fn resolve_state_target(&mut self, from: &ComponentId, attribute: &str) -> Option<StateKey> {
        let text = self.attribute_of(from, attribute)?;
        let reference = parse_target(&text)?;
        if !reference.prop_indices.is_empty() {
            return None;
        }
        let namespace = self.store.arena.get(from)?.namespace.clone();
        let mut component = self.store.resolve_untracked(&reference.path, &namespace)?;
        for index in &reference.component_indices {
            let position = self
                .with_tracker(from, |tracker| {
                    crate::expr::evaluate(index, &namespace, tracker)
                })?
                .as_number()?;
            let children = self.active_children(&component);
            component = crate::expr::eval::pick(&children, position)?.clone();
        }
        let state = match &reference.prop {
            Some(prop) => prop.to_string(),
            None => self.class_of(&component)?.primary_state?.to_string(),
        };
        Some(StateKey::new(component, &state))
    }
}

/// `$n.value`, `n.value`, `$(a/b)` or plain `a/b`.
fn parse_target(text: &str) -> Option<Reference> {
    let text = text.trim();
    if text.starts_with('$') {
        return parse_reference(text).ok();
    }
    let (path, prop) = match text.rsplit_once('.') {
        Some((path, prop)) if !path.ends_with('.') => (path, Some(prop)),
        _ => (text, None),
    };
    Some(Reference {
        path: RefPath::parse(path)?,
        component_indices: Vec::new(),
        prop: prop.map(Into::into),
        prop_indices: Vec::new(),
    })
}

pub(crate) struct Dispatched {
    pub target: ComponentId,
    pub action: &'static str,
    pub effect: ActionEffect,
}

/// Runs the checks, in order, and then the handler.
pub(crate) fn dispatch(store: &mut Store, request: &ActionRequest) -> Result<Dispatched, Rejection> {
    if store.flags.read_only && request.source == RequestSource::External {
        return Err(Rejection::ReadOnlyRejected);
    }
    let target = store
        .lookup(&request.target)
        .ok_or_else(|| Rejection::UnresolvedTarget(request.target.clone()))?;
    if store.read(&StateKey::new(target.clone(), DISABLED)).truthy() {
        return Err(Rejection::DisabledTarget);
    }
    let class = store
        .arena
        .get(&target)
        .map(|record| record.class)
        .ok_or_else(|| Rejection::UnresolvedTarget(request.target.clone()))?;
    let action = class
        .action(&request.action)
        .ok_or_else(|| Rejection::UnknownAction(request.action.clone()))?;

    let mut context = ActionContext {
        store,
        target: target.clone(),
        args: &request.args,
    };
    let effect = (action.handler)(&mut context)?;
    Ok(Dispatched {
        target,
        action: action.name,
        effect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_targets() {
        let reference = parse_target("p.x").unwrap();
        assert_eq!(reference.path.to_string(), "p");
        assert_eq!(reference.prop.as_deref(), Some("x"));

        let reference = parse_target("../a/n").unwrap();
        assert_eq!(reference.path.to_string(), "../a/n");
        assert_eq!(reference.prop, None);

        let reference = parse_target("$(/a/n).value").unwrap();
        assert!(reference.path.absolute);
        assert_eq!(reference.prop.as_deref(), Some("value"));
    }

    #[test]
    fn request_builder() {
        let request = ActionRequest::new("/n", "updateValue")
            .with_arg("value", 3.0)
            .internal();
        assert_eq!(request.source, RequestSource::Internal);
        assert_eq!(request.args.get("value"), Some(&Value::Number(3.0)));
    }
}
