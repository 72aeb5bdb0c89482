use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::address::{DepKey, StateKey};

/// Dependencies recorded by one evaluation.
pub type DepList = SmallVec<[DepKey; 8]>;

/// Edges between state variables (and name probes) and the states that
/// consumed them during their last evaluation.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// producer -> states that read it
    consumers: FxHashMap<DepKey, FxHashSet<StateKey>>,
    /// consumer -> what it read last time
    producers: FxHashMap<StateKey, DepList>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the consumer's edges with exactly `deps`.
    pub fn set_producers(&mut self, consumer: &StateKey, deps: DepList) {
        self.clear_producers(consumer);
        for dep in &deps {
            self.consumers
                .entry(dep.clone())
                .or_default()
                .insert(consumer.clone());
        }
        self.producers.insert(consumer.clone(), deps);
    }

    /// Drops every edge into `consumer`.
    pub fn clear_producers(&mut self, consumer: &StateKey) {
        let Some(old) = self.producers.remove(consumer) else {
            return;
        };
        for dep in old {
            if let Some(readers) = self.consumers.get_mut(&dep) {
                readers.remove(consumer);
                if readers.is_empty() {
                    self.consumers.remove(&dep);
                }
            }
        }
    }

    pub fn producers_of(&self, consumer: &StateKey) -> &[DepKey] {
        self.producers
            .get(consumer)
            .map(|deps| deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn consumers_of(&self, producer: &DepKey) -> impl Iterator<Item = &StateKey> {
        self.consumers.get(producer).into_iter().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.producers.values().map(|deps| deps.len()).sum()
    }
}
