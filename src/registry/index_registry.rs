//! Dense slot allocation for live objects with idle eviction

use super::{IdleThresholds, ObjectKind};
use rustc_hash::FxHashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy)]
struct Entry {
    slot: u32,
    kind: ObjectKind,
    last_touch: u64,
}

/// Maps handles to dense `u32` slots used to index per-object GPU buffers.
///
/// A slot is unique per live handle, is never reused while the handle is
/// alive, and is returned to the free list exactly once. Two slot->handle
/// views are kept: the upload view tracks the current state, the committed
/// view is whatever snapshot was last installed with [`swap`](Self::swap)
/// (the mapping that belongs to the most recent consumed GPU result).
pub struct IndexedObjectRegistry<H> {
    entries: FxHashMap<H, Entry>,
    slots: Vec<Option<H>>,
    free: Vec<u32>,
    clock: u64,
    thresholds: IdleThresholds,

    committed: Vec<Option<H>>,
    committed_index: FxHashMap<H, u32>,
}

impl<H: Copy + Eq + Hash> IndexedObjectRegistry<H> {
    pub fn new(thresholds: IdleThresholds) -> Self {
        Self {
            entries: FxHashMap::default(),
            slots: Vec::new(),
            free: Vec::new(),
            clock: 0,
            thresholds,
            committed: Vec::new(),
            committed_index: FxHashMap::default(),
        }
    }

    /// Register `handle` (or refresh it if already present) and return its slot
    pub fn add(&mut self, handle: H, kind: ObjectKind) -> u32 {
        let clock = self.clock;
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.last_touch = clock;
            return entry.slot;
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(handle);
                slot
            }
            None => {
                self.slots.push(Some(handle));
                (self.slots.len() - 1) as u32
            }
        };

        self.entries.insert(
            handle,
            Entry {
                slot,
                kind,
                last_touch: clock,
            },
        );
        slot
    }

    /// Refresh the idle timer; returns false for unknown handles
    pub fn touch(&mut self, handle: H) -> bool {
        match self.entries.get_mut(&handle) {
            Some(entry) => {
                entry.last_touch = self.clock;
                true
            }
            None => false,
        }
    }

    /// Free the handle's slot; `None` if it was not registered
    pub fn remove(&mut self, handle: H) -> Option<u32> {
        let entry = self.entries.remove(&handle)?;
        self.slots[entry.slot as usize] = None;
        self.free.push(entry.slot);
        self.trim_tail();
        Some(entry.slot)
    }

    pub fn slot(&self, handle: H) -> Option<u32> {
        self.entries.get(&handle).map(|entry| entry.slot)
    }

    /// Slot as a signed index, `-1` when absent
    pub fn index_of(&self, handle: H) -> i64 {
        self.slot(handle).map_or(-1, i64::from)
    }

    pub fn contains(&self, handle: H) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn kind_of(&self, handle: H) -> Option<ObjectKind> {
        self.entries.get(&handle).map(|entry| entry.kind)
    }

    /// Advance the idle clock by one tick and evict every entry whose idle
    /// time reached its kind's threshold. Returns the evicted (handle, slot)
    /// pairs ordered by slot.
    pub fn tick(&mut self) -> Vec<(H, u32)> {
        self.clock += 1;
        let clock = self.clock;
        let thresholds = self.thresholds;

        let mut evicted: Vec<(H, u32)> = self
            .entries
            .iter()
            .filter(|(_, entry)| match thresholds.for_kind(entry.kind) {
                Some(limit) => clock - entry.last_touch >= u64::from(limit),
                None => false,
            })
            .map(|(handle, entry)| (*handle, entry.slot))
            .collect();
        evicted.sort_unstable_by_key(|(_, slot)| *slot);

        for (handle, _) in &evicted {
            self.remove(*handle);
        }
        evicted
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One past the highest slot still in use
    pub fn high_water(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Live handles with their slots, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (H, u32)> + '_ {
        self.entries.iter().map(|(handle, entry)| (*handle, entry.slot))
    }

    /// Slot-indexed view of the current mapping
    pub fn upload_view(&self) -> &[Option<H>] {
        &self.slots
    }

    pub fn snapshot(&self) -> Vec<Option<H>> {
        self.slots.clone()
    }

    pub fn committed_view(&self) -> &[Option<H>] {
        &self.committed
    }

    pub fn committed_handle(&self, slot: u32) -> Option<H> {
        self.committed.get(slot as usize).copied().flatten()
    }

    pub fn committed_slot(&self, handle: H) -> Option<u32> {
        self.committed_index.get(&handle).copied()
    }

    /// Install `snapshot` as the committed view
    pub fn swap(&mut self, snapshot: Vec<Option<H>>) {
        self.committed_index.clear();
        for (slot, handle) in snapshot.iter().enumerate() {
            if let Some(handle) = handle {
                self.committed_index.insert(*handle, slot as u32);
            }
        }
        self.committed = snapshot;
    }

    /// Drop every handle and both views
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
        self.free.clear();
        self.committed.clear();
        self.committed_index.clear();
    }

    fn trim_tail(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let len = self.slots.len() as u32;
        self.free.retain(|slot| *slot < len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ObjectHandle;

    fn registry() -> IndexedObjectRegistry<ObjectHandle> {
        IndexedObjectRegistry::new(IdleThresholds {
            transient: 3,
            persistent: 10,
        })
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut reg = registry();
        let a = reg.add(ObjectHandle(7), ObjectKind::Transient);
        let b = reg.add(ObjectHandle(7), ObjectKind::Transient);
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.index_of(ObjectHandle(7)), a as i64);
        assert_eq!(reg.index_of(ObjectHandle(8)), -1);
    }

    #[test]
    fn test_slots_are_unique_and_freed_slot_is_reused() {
        let mut reg = registry();
        let slots: Vec<u32> = (0..5)
            .map(|i| reg.add(ObjectHandle(i), ObjectKind::Persistent))
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);

        assert_eq!(reg.remove(ObjectHandle(2)), Some(2));
        assert_eq!(reg.remove(ObjectHandle(2)), None);
        assert_eq!(reg.add(ObjectHandle(100), ObjectKind::Persistent), 2);
        assert_eq!(reg.add(ObjectHandle(101), ObjectKind::Persistent), 5);
    }

    #[test]
    fn test_trailing_free_slots_are_trimmed() {
        let mut reg = registry();
        for i in 0..4 {
            reg.add(ObjectHandle(i), ObjectKind::Persistent);
        }
        reg.remove(ObjectHandle(1));
        reg.remove(ObjectHandle(3));
        assert_eq!(reg.high_water(), 3);

        reg.remove(ObjectHandle(2));
        assert_eq!(reg.high_water(), 1);

        // Trimmed slots must not come back out of the free list
        assert_eq!(reg.add(ObjectHandle(9), ObjectKind::Persistent), 1);
        assert_eq!(reg.add(ObjectHandle(10), ObjectKind::Persistent), 2);
    }

    #[test]
    fn test_eviction_happens_exactly_at_threshold() {
        let mut reg = registry();
        reg.add(ObjectHandle(1), ObjectKind::Transient);

        assert!(reg.tick().is_empty());
        assert!(reg.tick().is_empty());
        let evicted = reg.tick();
        assert_eq!(evicted, vec![(ObjectHandle(1), 0)]);
        assert!(!reg.contains(ObjectHandle(1)));
    }

    #[test]
    fn test_touch_postpones_eviction() {
        let mut reg = registry();
        reg.add(ObjectHandle(1), ObjectKind::Transient);
        reg.tick();
        reg.tick();
        assert!(reg.touch(ObjectHandle(1)));
        reg.tick();
        reg.tick();
        assert!(reg.contains(ObjectHandle(1)));
        assert_eq!(reg.tick().len(), 1);
        assert!(!reg.touch(ObjectHandle(1)));
    }

    #[test]
    fn test_kinds_have_their_own_thresholds() {
        let mut reg = registry();
        reg.add(ObjectHandle(1), ObjectKind::Transient);
        reg.add(ObjectHandle(2), ObjectKind::Persistent);
        reg.add(ObjectHandle(3), ObjectKind::Pinned);

        for _ in 0..3 {
            reg.tick();
        }
        assert!(!reg.contains(ObjectHandle(1)));
        assert!(reg.contains(ObjectHandle(2)));

        for _ in 0..100 {
            reg.tick();
        }
        assert!(!reg.contains(ObjectHandle(2)));
        assert!(reg.contains(ObjectHandle(3)));
        assert_eq!(reg.kind_of(ObjectHandle(3)), Some(ObjectKind::Pinned));
    }

    #[test]
    fn test_committed_view_follows_swapped_snapshot() {
        let mut reg = registry();
        reg.add(ObjectHandle(1), ObjectKind::Persistent);
        reg.add(ObjectHandle(2), ObjectKind::Persistent);
        let snapshot = reg.snapshot();

        reg.remove(ObjectHandle(1));
        reg.add(ObjectHandle(3), ObjectKind::Persistent);
        assert!(reg.committed_view().is_empty());

        reg.swap(snapshot);
        assert_eq!(reg.committed_handle(0), Some(ObjectHandle(1)));
        assert_eq!(reg.committed_slot(ObjectHandle(2)), Some(1));
        assert_eq!(reg.committed_slot(ObjectHandle(3)), None);
        assert_eq!(reg.upload_view()[0], Some(ObjectHandle(3)));
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut reg = registry();
        reg.add(ObjectHandle(1), ObjectKind::Persistent);
        reg.swap(reg.snapshot());
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.high_water(), 0);
        assert!(reg.committed_view().is_empty());
    }
}
