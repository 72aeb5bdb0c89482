use std::sync::Arc;

use smallvec::SmallVec;

use super::address::{ComponentId, DepKey, Namespace, StateKey};
use super::error::{EvalIssue, EvalResult, Issue};
use super::graph::DepList;
use super::resolver;
use super::state::{HIDE, STRUCTURE};
use super::store::Store;
use super::value::{UNDEFINED_TEXT, Value};
use crate::components::ComponentClass;
use crate::config::DocumentFlags;
use crate::document::ComponentSpec;
use crate::expr::{RefPath, evaluate};

/// Read access to the store for one state rule, recording every state and
/// name probe it consults.
pub struct Tracker<'a> {
    store: &'a mut Store,
    this: ComponentId,
    deps: DepList,
    tracking: bool,
}

impl<'a> Tracker<'a> {
    pub(crate) fn new(store: &'a mut Store, this: ComponentId) -> Self {
        Self {
            store,
            this,
            deps: SmallVec::new(),
            tracking: true,
        }
    }

    /// Same reads, nothing recorded. Used by action handlers and chaining.
    pub(crate) fn untracked(store: &'a mut Store, this: ComponentId) -> Self {
        Self {
            tracking: false,
            ..Self::new(store, this)
        }
    }

    pub(crate) fn into_deps(self) -> DepList {
        self.deps
    }

    fn record(&mut self, dep: DepKey) {
        if self.tracking && !self.deps.contains(&dep) {
            self.deps.push(dep);
        }
    }

    /// Component whose state is being computed.
    pub fn this(&self) -> &ComponentId {
        &self.this
    }

    pub fn flags(&self) -> DocumentFlags {
        self.store.flags
    }

    pub fn spec(&self) -> Arc<ComponentSpec> {
        self.spec_of(&self.this)
            .unwrap_or_else(|| Arc::new(ComponentSpec::new("placeholder")))
    }

    pub fn spec_of(&self, id: &ComponentId) -> Option<Arc<ComponentSpec>> {
        self.store.arena.get(id).map(|record| record.spec.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attribute_of(&self.this, name)
    }

    pub fn attribute_of(&self, id: &ComponentId, name: &str) -> Option<String> {
        self.store
            .arena
            .get(id)
            .and_then(|record| record.attribute(name))
            .map(str::to_string)
    }

    pub fn namespace(&self) -> Namespace {
        self.store
            .arena
            .get(&self.this)
            .map(|record| record.namespace.clone())
            .unwrap_or_default()
    }

    pub fn child_namespace(&self) -> Namespace {
        self.store
            .arena
            .get(&self.this)
            .map(|record| record.child_namespace.clone())
            .unwrap_or_default()
    }

    pub fn class_of(&self, id: &ComponentId) -> Option<&'static ComponentClass> {
        self.store.arena.get(id).map(|record| record.class)
    }

    pub fn has_state(&self, id: &ComponentId, state: &str) -> bool {
        self.store
            .arena
            .get(id)
            .is_some_and(|record| record.states.contains_key(state))
    }

    pub fn parent_of(&self, id: &ComponentId) -> Option<ComponentId> {
        self.store.arena.get(id).and_then(|record| record.parent.clone())
    }

    /// Authored children; static for the component's lifetime.
    pub fn static_children(&self, id: &ComponentId) -> Vec<ComponentId> {
        self.store
            .arena
            .get(id)
            .map(|record| record.children.clone())
            .unwrap_or_default()
    }

    pub fn exists(&mut self, id: &ComponentId) -> bool {
        self.record(DepKey::Exists(id.clone()));
        self.store.arena.contains(id)
    }

    pub fn state(&mut self, id: &ComponentId, state: &str) -> EvalResult<Value> {
        let key = StateKey::new(id.clone(), state);
        if !self.store.arena.contains(id) {
            self.record(DepKey::Exists(id.clone()));
            self.record(DepKey::State(key));
            return Err(EvalIssue::Pending);
        }
        self.record(DepKey::State(key.clone()));
        self.store.get_value(&key)
    }

    pub fn own(&mut self, state: &str) -> EvalResult<Value> {
        let this = self.this.clone();
        self.state(&this, state)
    }

    pub fn eval_source(&mut self, source: &str) -> EvalResult<Value> {
        let namespace = self.namespace();
        self.eval_source_in(source, &namespace)
    }

    pub fn eval_source_in(&mut self, source: &str, namespace: &Namespace) -> EvalResult<Value> {
        let expr = self
            .store
            .parsed(source)
            .map_err(|message| EvalIssue::Failed(message.to_string()))?;
        evaluate(&expr, namespace, self)
    }

    /// Evaluated attribute, `None` when the attribute is absent.
    pub fn eval_attribute(&mut self, name: &str) -> EvalResult<Option<Value>> {
        match self.attribute(name) {
            Some(source) => self.eval_source(&source).map(Some),
            None => Ok(None),
        }
    }

    pub fn number_attribute(&mut self, name: &str, default: f64) -> EvalResult<Value> {
        Ok(match self.eval_attribute(name)? {
            Some(value) => value.to_number(),
            None => Value::Number(default),
        })
    }

    pub fn resolve(&mut self, path: &RefPath, from: &Namespace) -> EvalResult<ComponentId> {
        let mut probes: SmallVec<[ComponentId; 4]> = SmallVec::new();
        let found = {
            let arena = &self.store.arena;
            resolver::resolve_path(path, from, &mut |id| {
                probes.push(id.clone());
                arena.contains(id)
            })
        };
        for probe in probes {
            self.record(DepKey::Exists(probe));
        }
        match found {
            Some(id) => Ok(id),
            None => {
                self.store.diagnostics.report(Issue::UnresolvedReference {
                    from: self.this.clone(),
                    path: path.to_string(),
                });
                Err(EvalIssue::Pending)
            }
        }
    }

    /// Active replacement roots of a composite, through its structure state.
    pub fn replacement_roots(&mut self, id: &ComponentId) -> EvalResult<Vec<ComponentId>> {
        let structure = self.state(id, STRUCTURE)?;
        Ok(structure
            .items()
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.as_component().cloned())
            .collect())
    }

    /// Children as rendered: composites are replaced by their active
    /// replacements, recursively. Hidden children are included.
    pub fn active_children(&mut self, id: &ComponentId) -> EvalResult<Vec<ComponentId>> {
        self.expanded_children(id, None)
    }

    fn expanded_children(
        &mut self,
        id: &ComponentId,
        skip: Option<&ComponentId>,
    ) -> EvalResult<Vec<ComponentId>> {
        let composite = self
            .store
            .arena
            .get(id)
            .is_some_and(|record| record.is_composite());
        let direct = if composite {
            self.replacement_roots(id)?
        } else {
            self.static_children(id)
        };
        let mut out = Vec::with_capacity(direct.len());
        for child in direct {
            let child_is_composite = self
                .store
                .arena
                .get(&child)
                .is_some_and(|record| record.is_composite());
            if child_is_composite {
                if skip != Some(&child) {
                    out.extend(self.expanded_children(&child, skip)?);
                }
            } else {
                out.push(child);
            }
        }
        Ok(out)
    }

    /// Active descendants in document order, not descending into `skip`.
    pub fn descendants(
        &mut self,
        id: &ComponentId,
        skip: Option<&ComponentId>,
    ) -> EvalResult<Vec<ComponentId>> {
        let mut out = Vec::new();
        let mut stack = vec![self.expanded_children(id, skip)?];
        while let Some(level) = stack.last_mut() {
            if level.is_empty() {
                stack.pop();
                continue;
            }
            let next = level.remove(0);
            let nested = self.expanded_children(&next, skip)?;
            out.push(next);
            stack.push(nested);
        }
        Ok(out)
    }

    pub fn is_hidden(&mut self, id: &ComponentId) -> EvalResult<bool> {
        match self.state(id, HIDE) {
            Ok(value) => Ok(value.truthy()),
            Err(EvalIssue::Pending) => Ok(false),
            Err(issue) => Err(issue),
        }
    }

    /// Active children not hidden below `id`. Inside a hidden component
    /// every child inherits the hiding, so nothing further is left out.
    /// Hidden children still exist and recompute.
    pub fn visible_children(&mut self, id: &ComponentId) -> EvalResult<Vec<ComponentId>> {
        let hidden_here = self.is_hidden(id)?;
        let mut visible = Vec::new();
        for child in self.active_children(id)? {
            if hidden_here || !self.is_hidden(&child)? {
                visible.push(child);
            }
        }
        Ok(visible)
    }

    /// The value a bare `$name` reference produces.
    pub fn primary_value(&mut self, id: &ComponentId) -> EvalResult<Value> {
        let Some(class) = self.class_of(id) else {
            self.record(DepKey::Exists(id.clone()));
            return Err(EvalIssue::Pending);
        };
        if class.composite {
            let roots = self.active_children(id)?;
            let mut values = roots
                .iter()
                .map(|root| self.primary_value(root))
                .collect::<EvalResult<Vec<_>>>()?;
            return Ok(match values.len() {
                1 => values.remove(0),
                _ => Value::list(values),
            });
        }
        match class.primary_state {
            Some(primary) => self.state(id, primary),
            None if self.has_state(id, "text") => self.state(id, "text"),
            None => Ok(Value::Undefined),
        }
    }

    /// Text as rendered inside a paragraph. Anything still pending renders
    /// as the undefined placeholder.
    pub fn text_of(&mut self, id: &ComponentId) -> EvalResult<String> {
        let value = if self.has_state(id, "text") {
            self.state(id, "text")
        } else {
            self.primary_value(id)
        };
        match value {
            Ok(value) => Ok(value.to_display_string()),
            Err(EvalIssue::Pending) => Ok(UNDEFINED_TEXT.to_string()),
            Err(issue) => Err(issue),
        }
    }
}
