use rustc_hash::FxHashMap;

use super::address::{ComponentId, Namespace};
use super::error::EngineError;
use super::node::ComponentRecord;

/// Generational index into the arena.
/// Allows safe reuse of slots with use-after-free detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SlotId {
    pub index: u32,
    pub generation: u32,
}

struct Slot {
    generation: u32,
    record: Option<ComponentRecord>,
}

/// Arena of live component records, addressable by slot or by id.
pub struct Arena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    /// Side table: ComponentId -> SlotId
    by_id: FxHashMap<ComponentId, SlotId>,
    /// Next automatic name number per (namespace, component type)
    auto_names: FxHashMap<(Namespace, &'static str), u32>,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            by_id: FxHashMap::default(),
            auto_names: FxHashMap::default(),
        }
    }

    /// Store a record, failing if its id is taken.
    pub fn insert(&mut self, record: ComponentRecord) -> Result<SlotId, EngineError> {
        if self.by_id.contains_key(&record.id) {
            return Err(EngineError::DuplicateName { id: record.id });
        }
        let id = record.id.clone();
        let slot = if let Some(index) = self.free_list.pop() {
            // Reuse freed slot; its generation was bumped on removal
            let entry = &mut self.slots[index as usize];
            entry.record = Some(record);
            SlotId {
                index,
                generation: entry.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            SlotId {
                index,
                generation: 0,
            }
        };
        self.by_id.insert(id, slot);
        Ok(slot)
    }

    /// Remove a record, invalidating its slot.
    pub fn remove(&mut self, id: &ComponentId) -> Option<ComponentRecord> {
        let slot = self.by_id.remove(id)?;
        let entry = &mut self.slots[slot.index as usize];
        entry.generation += 1;
        self.free_list.push(slot.index);
        entry.record.take()
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn slot_of(&self, id: &ComponentId) -> Option<SlotId> {
        self.by_id.get(id).copied()
    }

    /// Check if a SlotId is valid (correct generation).
    pub fn is_valid(&self, slot: SlotId) -> bool {
        slot.index < self.slots.len() as u32
            && self.slots[slot.index as usize].generation == slot.generation
            && self.slots[slot.index as usize].record.is_some()
    }

    pub fn get(&self, id: &ComponentId) -> Option<&ComponentRecord> {
        self.slot_of(id).and_then(|slot| self.get_slot(slot))
    }

    pub fn get_mut(&mut self, id: &ComponentId) -> Option<&mut ComponentRecord> {
        let slot = self.slot_of(id)?;
        self.slots[slot.index as usize].record.as_mut()
    }

    pub fn get_slot(&self, slot: SlotId) -> Option<&ComponentRecord> {
        if self.is_valid(slot) {
            self.slots[slot.index as usize].record.as_ref()
        } else {
            None
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Next `_{type}{n}` name for an unnamed component. Numbers only grow,
    /// so a destroyed component's name is not handed out again.
    pub fn next_auto_name(&mut self, namespace: &Namespace, kind: &'static str) -> String {
        let counter = self
            .auto_names
            .entry((namespace.clone(), kind))
            .or_insert(0);
        *counter += 1;
        format!("_{kind}{counter}")
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::node::ComponentRecord;

    fn record(path: &str) -> ComponentRecord {
        ComponentRecord::bare(ComponentId::from(path))
    }

    #[test]
    fn arena_insert_and_remove() {
        let mut arena = Arena::new();

        let slot1 = arena.insert(record("/a")).unwrap();
        let slot2 = arena.insert(record("/b")).unwrap();

        assert!(arena.is_valid(slot1));
        assert!(arena.is_valid(slot2));
        assert_ne!(slot1, slot2);

        arena.remove(&ComponentId::from("/a"));
        assert!(!arena.is_valid(slot1));
        assert!(!arena.contains(&ComponentId::from("/a")));

        // Reuse freed slot
        let slot3 = arena.insert(record("/c")).unwrap();
        assert_eq!(slot3.index, slot1.index);
        assert_ne!(slot3.generation, slot1.generation);
        assert!(arena.get_slot(slot1).is_none());
    }

    #[test]
    fn arena_rejects_duplicate_ids() {
        let mut arena = Arena::new();
        arena.insert(record("/a")).unwrap();
        let error = arena.insert(record("/a")).unwrap_err();
        assert_eq!(
            error,
            EngineError::DuplicateName {
                id: ComponentId::from("/a")
            }
        );
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn auto_names_keep_counting() {
        let mut arena = Arena::new();
        let root = Namespace::root();
        assert_eq!(arena.next_auto_name(&root, "point"), "_point1");
        assert_eq!(arena.next_auto_name(&root, "point"), "_point2");
        assert_eq!(arena.next_auto_name(&root, "text"), "_text1");

        let nested = ComponentId::from("/a").as_namespace();
        assert_eq!(arena.next_auto_name(&nested, "point"), "_point1");
    }
}
