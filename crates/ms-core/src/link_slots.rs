use crate::entity::EntityId;

/// Outcome of [`LinkSlots::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotInsert {
    /// The id was already stored; nothing changed.
    Present,
    /// The id was written into a hole left by an earlier erase.
    FilledHole,
    /// The id was appended, growing the slot vector.
    Appended,
}

impl SlotInsert {
    /// Returns `true` if the insert changed the contents.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Present)
    }
}

/// Sparse, unordered storage of entity ids.
///
/// Erasing leaves a hole that the next insert reuses, so positions of other
/// ids never shift while a model iterates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSlots {
    slots: Vec<Option<EntityId>>,
}

impl LinkSlots {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `id` unless it is already present.
    pub fn insert(&mut self, id: EntityId) -> SlotInsert {
        let mut hole = None;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(existing) if *existing == id => return SlotInsert::Present,
                None if hole.is_none() => hole = Some(i),
                _ => {}
            }
        }
        match hole {
            Some(i) => {
                self.slots[i] = Some(id);
                SlotInsert::FilledHole
            }
            None => {
                self.slots.push(Some(id));
                SlotInsert::Appended
            }
        }
    }

    /// Erase `id`, leaving a hole. Returns `false` if it was not present.
    pub fn erase(&mut self, id: EntityId) -> bool {
        match self.slots.iter_mut().find(|s| **s == Some(id)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Empty every slot and return the ids that were stored, in slot order.
    pub fn take_all(&mut self) -> Vec<EntityId> {
        let ids = self.iter().collect();
        for slot in &mut self.slots {
            *slot = None;
        }
        ids
    }

    /// Returns `true` if `id` is stored.
    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains(&Some(id))
    }

    /// Number of stored ids, holes excluded.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if no ids are stored.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of slots, holes included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Stored ids in slot order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// The first stored id at or after slot `start`, with its slot index.
    pub fn next_from(&self, start: usize) -> Option<(usize, EntityId)> {
        self.slots
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, s)| s.map(|id| (i, id)))
    }

    /// Stored ids as a comma-separated list.
    pub fn contents(&self) -> String {
        self.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut slots = LinkSlots::new();
        assert_eq!(slots.insert(EntityId(3)), SlotInsert::Appended);
        assert_eq!(slots.insert(EntityId(3)), SlotInsert::Present);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn holes_are_reused() {
        let mut slots = LinkSlots::new();
        for n in 1..=3 {
            slots.insert(EntityId(n));
        }
        assert!(slots.erase(EntityId(2)));
        assert!(!slots.erase(EntityId(2)));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.capacity(), 3);
        assert_eq!(slots.contents(), "1,3");
        assert_eq!(slots.insert(EntityId(9)), SlotInsert::FilledHole);
        assert_eq!(slots.capacity(), 3);
        assert_eq!(slots.contents(), "1,9,3");
    }

    #[test]
    fn next_from_skips_holes() {
        let mut slots = LinkSlots::new();
        for n in 1..=3 {
            slots.insert(EntityId(n));
        }
        slots.erase(EntityId(1));
        assert_eq!(slots.next_from(0), Some((1, EntityId(2))));
        assert_eq!(slots.next_from(2), Some((2, EntityId(3))));
        assert_eq!(slots.next_from(3), None);
    }

    #[test]
    fn take_all_leaves_holes() {
        let mut slots = LinkSlots::new();
        slots.insert(EntityId(4));
        slots.insert(EntityId(5));
        assert_eq!(slots.take_all(), vec![EntityId(4), EntityId(5)]);
        assert!(slots.is_empty());
        assert_eq!(slots.capacity(), 2);
    }
}
