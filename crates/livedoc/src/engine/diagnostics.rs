//! Per-cycle bookkeeping: recompute counts, issues and "why did X change?".

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use super::address::{DepKey, StateKey};
use super::error::Issue;
use super::graph::DependencyGraph;
use super::value::Value;

/// Why a state changed during the last cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReason {
    pub key: StateKey,
    pub cycle: u64,
    /// Producers that also changed in that cycle.
    pub triggered_by: Vec<StateKey>,
}

/// A recorded change event, kept only while tracing is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub cycle: u64,
    pub key: StateKey,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    cycle: u64,
    recomputes: FxHashMap<StateKey, u32>,
    changed: FxHashSet<StateKey>,
    issues: Vec<Issue>,
    seen: FxHashSet<Issue>,
    /// Enable detailed change tracking
    pub tracing: bool,
    pub changes: Vec<ChangeEvent>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
        self.recomputes.clear();
        self.changed.clear();
        self.issues.clear();
        self.seen.clear();
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn record_recompute(&mut self, key: &StateKey) {
        *self.recomputes.entry(key.clone()).or_insert(0) += 1;
    }

    pub fn record_change(&mut self, key: &StateKey, old_value: &Value, new_value: &Value) {
        self.changed.insert(key.clone());
        if self.tracing {
            self.changes.push(ChangeEvent {
                cycle: self.cycle,
                key: key.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            });
        }
    }

    /// Recomputations of `key` since the cycle began.
    pub fn recomputes_of(&self, key: &StateKey) -> u32 {
        self.recomputes.get(key).copied().unwrap_or(0)
    }

    pub fn total_recomputes(&self) -> u64 {
        self.recomputes.values().map(|count| u64::from(*count)).sum()
    }

    /// Adds an issue unless the same one was already reported this cycle.
    pub fn report(&mut self, issue: Issue) {
        if self.seen.insert(issue.clone()) {
            log::debug!("{issue}");
            self.issues.push(issue);
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn why_did_change(&self, graph: &DependencyGraph, key: &StateKey) -> Option<ChangeReason> {
        if !self.changed.contains(key) {
            return None;
        }
        let triggered_by = graph
            .producers_of(key)
            .iter()
            .filter_map(|dep| match dep {
                DepKey::State(producer) if self.changed.contains(producer) => Some(producer.clone()),
                _ => None,
            })
            .collect();
        Some(ChangeReason {
            key: key.clone(),
            cycle: self.cycle,
            triggered_by,
        })
    }

    pub fn changes_in_cycle(&self, cycle: u64) -> Vec<&ChangeEvent> {
        self.changes.iter().filter(|event| event.cycle == cycle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::address::ComponentId;
    use smallvec::SmallVec;

    #[test]
    fn issues_deduplicate_within_a_cycle() {
        let mut diagnostics = Diagnostics::new();
        let issue = Issue::UnresolvedReference {
            from: ComponentId::from("/p"),
            path: "missing".into(),
        };
        diagnostics.begin_cycle(1);
        diagnostics.report(issue.clone());
        diagnostics.report(issue.clone());
        assert_eq!(diagnostics.issues().len(), 1);

        diagnostics.begin_cycle(2);
        assert!(diagnostics.issues().is_empty());
        diagnostics.report(issue);
        assert_eq!(diagnostics.issues().len(), 1);
    }

    #[test]
    fn change_reason_names_changed_producers() {
        let mut diagnostics = Diagnostics::new();
        let mut graph = DependencyGraph::new();
        let input = StateKey::new(ComponentId::from("/n"), "value");
        let other = StateKey::new(ComponentId::from("/m"), "value");
        let output = StateKey::new(ComponentId::from("/t"), "value");
        graph.set_producers(
            &output,
            SmallVec::from_iter([DepKey::State(input.clone()), DepKey::State(other)]),
        );

        diagnostics.begin_cycle(3);
        diagnostics.record_change(&input, &Value::Number(1.0), &Value::Number(2.0));
        diagnostics.record_change(&output, &Value::Number(2.0), &Value::Number(4.0));

        let reason = diagnostics.why_did_change(&graph, &output).unwrap();
        assert_eq!(reason.triggered_by, vec![input]);
        assert_eq!(reason.cycle, 3);
    }
}
