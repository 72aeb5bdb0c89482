//! State store: component arena, dependency graph and lazy recomputation.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::address::{ComponentId, DepKey, Namespace, StateKey};
use super::arena::Arena;
use super::diagnostics::Diagnostics;
use super::error::{EvalIssue, EvalResult, Issue};
use super::graph::DependencyGraph;
use super::resolver;
use super::state::Rule;
use super::tracker::Tracker;
use super::value::Value;
use crate::components::Registry;
use crate::config::DocumentFlags;
use crate::expr::{Expr, RefPath, parse_expression};

pub struct Store {
    pub(crate) arena: Arena,
    pub(crate) graph: DependencyGraph,
    pub(crate) registry: Registry,
    pub(crate) flags: DocumentFlags,
    pub(crate) diagnostics: Diagnostics,
    /// Last observed value of every `triggerWhen` condition.
    pub(crate) gate_memory: FxHashMap<ComponentId, bool>,
    pub(crate) root: Option<ComponentId>,
    /// States currently being evaluated, innermost last.
    in_progress: Vec<StateKey>,
    expressions: FxHashMap<Arc<str>, Result<Arc<Expr>, Arc<str>>>,
}

impl Store {
    pub fn new(registry: Registry, flags: DocumentFlags) -> Self {
        Self {
            arena: Arena::new(),
            graph: DependencyGraph::new(),
            registry,
            flags,
            diagnostics: Diagnostics::new(),
            gate_memory: FxHashMap::default(),
            root: None,
            in_progress: Vec::new(),
            expressions: FxHashMap::default(),
        }
    }

    /// Current value of a state, recomputing it (and whatever it reads)
    /// when stale.
    pub fn get_value(&mut self, key: &StateKey) -> EvalResult<Value> {
        let Some(record) = self.arena.get(&key.component) else {
            return Err(EvalIssue::Pending);
        };
        let Some(state) = record.state(&key.state) else {
            return Err(EvalIssue::Failed(format!(
                "{} has no state `{}`",
                key.component, key.state
            )));
        };
        if !state.stale {
            return Ok(state.value.clone());
        }
        self.recompute(key)
    }

    /// Like `get_value`, with anything not computable read as Undefined.
    pub fn read(&mut self, key: &StateKey) -> Value {
        self.get_value(key).unwrap_or_default()
    }

    /// Fresh value without recomputing.
    pub fn peek(&self, key: &StateKey) -> Option<&Value> {
        self.arena
            .get(&key.component)?
            .state(&key.state)?
            .current()
    }

    fn recompute(&mut self, key: &StateKey) -> EvalResult<Value> {
        if let Some(position) = self.in_progress.iter().position(|active| active == key) {
            let mut chain = self.in_progress[position..].to_vec();
            chain.push(key.clone());
            return Err(EvalIssue::Circular(chain));
        }
        let Some((rule, stored)) = self
            .arena
            .get(&key.component)
            .and_then(|record| record.state(&key.state))
            .map(|state| (state.rule.clone(), state.stored.clone()))
        else {
            return Err(EvalIssue::Pending);
        };

        self.diagnostics.record_recompute(key);
        if let Some(stored) = stored {
            self.graph.clear_producers(key);
            self.settle_state(key, stored.clone(), None);
            return Ok(stored);
        }

        self.in_progress.push(key.clone());
        let mut tracker = Tracker::new(self, key.component.clone());
        let result = match &rule {
            Rule::Constant(value) => Ok(value.clone()),
            Rule::Expression(source) => tracker.eval_source(source),
            Rule::Builtin(builtin) => builtin(&mut tracker),
            Rule::Link(source) => tracker.state(&source.component, &source.state),
        };
        let deps = tracker.into_deps();
        self.in_progress.pop();

        match result {
            Ok(value) => {
                self.graph.set_producers(key, deps);
                self.settle_state(key, value.clone(), None);
                Ok(value)
            }
            Err(EvalIssue::Pending) => {
                self.graph.set_producers(key, deps);
                self.leave_pending(key);
                Err(EvalIssue::Pending)
            }
            Err(EvalIssue::Failed(message)) => {
                self.graph.set_producers(key, deps);
                self.diagnostics.report(Issue::InvalidExpression {
                    key: key.clone(),
                    message: message.clone(),
                });
                self.settle_state(key, Value::Undefined, Some(message.into()));
                Ok(Value::Undefined)
            }
            // Keep the last known value and old edges; the cycle aborts.
            Err(circular) => Err(circular),
        }
    }

    fn settle_state(&mut self, key: &StateKey, value: Value, error: Option<Arc<str>>) {
        let Some(state) = self
            .arena
            .get_mut(&key.component)
            .and_then(|record| record.state_mut(&key.state))
        else {
            return;
        };
        let old = std::mem::replace(&mut state.value, value);
        state.stale = false;
        state.error = error;
        if old != state.value {
            let new = state.value.clone();
            self.diagnostics.record_change(key, &old, &new);
        }
    }

    fn leave_pending(&mut self, key: &StateKey) {
        if let Some(state) = self
            .arena
            .get_mut(&key.component)
            .and_then(|record| record.state_mut(&key.state))
        {
            state.value = Value::Undefined;
            state.stale = true;
            state.error = None;
        }
    }

    /// Marks everything reachable from `dep` stale.
    pub fn mark_stale(&mut self, dep: &DepKey) {
        if let DepKey::State(key) = dep {
            self.set_stale_flag(key);
        }
        let mut visited: FxHashSet<StateKey> = FxHashSet::default();
        let mut work: Vec<StateKey> = self.graph.consumers_of(dep).cloned().collect();
        while let Some(key) = work.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            self.set_stale_flag(&key);
            work.extend(self.graph.consumers_of(&DepKey::State(key)).cloned());
        }
    }

    fn set_stale_flag(&mut self, key: &StateKey) {
        if let Some(state) = self
            .arena
            .get_mut(&key.component)
            .and_then(|record| record.state_mut(&key.state))
        {
            state.stale = true;
        }
    }

    /// Stores a value over the state's rule and invalidates its readers.
    pub fn set_stored(&mut self, key: &StateKey, value: Value) {
        let Some(state) = self
            .arena
            .get_mut(&key.component)
            .and_then(|record| record.state_mut(&key.state))
        else {
            return;
        };
        state.stored = Some(value);
        self.mark_stale(&DepKey::State(key.clone()));
    }

    /// Follows linked states to the state that actually holds the value.
    pub fn link_source(&self, key: &StateKey) -> StateKey {
        let mut current = key.clone();
        let mut seen = FxHashSet::default();
        while seen.insert(current.clone()) {
            let next = self
                .arena
                .get(&current.component)
                .and_then(|record| record.state(&current.state))
                .and_then(|state| match &state.rule {
                    Rule::Link(source) => Some(source.clone()),
                    _ => None,
                });
            match next {
                Some(source) => current = source,
                None => break,
            }
        }
        current
    }

    /// Parsed expression, cached by source text.
    pub fn parsed(&mut self, source: &str) -> Result<Arc<Expr>, Arc<str>> {
        if let Some(cached) = self.expressions.get(source) {
            return cached.clone();
        }
        let parsed = parse_expression(source)
            .map(Arc::new)
            .map_err(|failure| Arc::<str>::from(failure.to_string()));
        self.expressions.insert(source.into(), parsed.clone());
        parsed
    }

    /// Name lookup that records nothing; used outside state rules.
    pub fn resolve_untracked(&self, path: &RefPath, from: &Namespace) -> Option<ComponentId> {
        resolver::resolve_path(path, from, &mut |id| self.arena.contains(id))
    }

    /// Accepts an absolute id or a path resolved from the root namespace.
    pub fn lookup(&self, text: &str) -> Option<ComponentId> {
        let exact = ComponentId::new(text);
        if self.arena.contains(&exact) {
            return Some(exact);
        }
        let path = RefPath::parse(text)?;
        self.resolve_untracked(&path, &Namespace::root())
    }

    /// Every component in document order, withheld and hidden included.
    pub fn document_order(&self) -> Vec<ComponentId> {
        let mut order = Vec::with_capacity(self.arena.len());
        let mut stack: Vec<ComponentId> = self.root.iter().cloned().collect();
        while let Some(id) = stack.pop() {
            if let Some(record) = self.arena.get(&id) {
                let nested: Vec<ComponentId> = record.nested().cloned().collect();
                stack.extend(nested.into_iter().rev());
                order.push(id);
            }
        }
        order
    }
}
