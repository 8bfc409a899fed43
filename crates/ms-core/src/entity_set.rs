use std::collections::HashMap;
use std::fmt;

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::ostree::OsTree;

/// An ordered collection of entities with logarithmic rank and select.
///
/// Members are ordered by a key taken from the entity when it was last
/// inserted, ties broken by entity id. Re-inserting a member with a changed
/// key moves it to its new position.
#[derive(Clone)]
pub struct EntitySet<K> {
    tree: OsTree<(K, EntityId)>,
    members: HashMap<EntityId, K>,
}

impl<K: Ord + Clone + fmt::Debug> fmt::Debug for EntitySet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySet")
            .field("len", &self.len())
            .field("members", &self.tree)
            .finish()
    }
}

impl<K: Ord + Clone> Default for EntitySet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> EntitySet<K> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            tree: OsTree::new(),
            members: HashMap::new(),
        }
    }

    /// Insert `id` under `key`, moving it if it is already a member with a
    /// different key. Returns `true` if the set changed.
    pub fn insert(&mut self, id: EntityId, key: K) -> CoreResult<bool> {
        if id.is_null() {
            return Err(CoreError::NullEntity);
        }
        if let Some(old) = self.members.get(&id) {
            if *old == key {
                return Ok(false);
            }
            let stale = (old.clone(), id);
            self.tree.remove(&stale);
        }
        self.tree.insert((key.clone(), id));
        self.members.insert(id, key);
        Ok(true)
    }

    /// Remove `id`. Returns `false` if it was not a member.
    pub fn erase(&mut self, id: EntityId) -> bool {
        match self.members.remove(&id) {
            Some(key) => self.tree.remove(&(key, id)),
            None => false,
        }
    }

    /// Returns `true` if `id` is a member.
    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The key `id` was last inserted under.
    pub fn key_of(&self, id: EntityId) -> Option<&K> {
        self.members.get(&id)
    }

    /// The member at one-based `rank`, or `None` when out of range.
    pub fn at(&self, rank: usize) -> Option<EntityId> {
        if rank == 0 {
            return None;
        }
        self.tree.select(rank - 1).map(|(_, id)| *id)
    }

    /// One-based rank of `id`, or 0 if it is not a member.
    pub fn rank(&self, id: EntityId) -> usize {
        self.members
            .get(&id)
            .and_then(|key| self.tree.rank(&(key.clone(), id)))
            .map_or(0, |r| r + 1)
    }

    /// The member at zero-based `index`.
    pub fn select(&self, index: usize) -> CoreResult<EntityId> {
        self.tree
            .select(index)
            .map(|(_, id)| *id)
            .ok_or(CoreError::SelectOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Pick a member with a uniform draw in `[0, 1)`.
    ///
    /// The member at zero-based position `floor(draw * len)` is returned, or
    /// `None` when the set is empty.
    pub fn random_pick(&self, draw: f64) -> CoreResult<Option<EntityId>> {
        if !(0.0..1.0).contains(&draw) {
            return Err(CoreError::InvalidDraw(draw));
        }
        if self.is_empty() {
            return Ok(None);
        }
        let index = ((draw * self.len() as f64).floor() as usize).min(self.len() - 1);
        self.select(index).map(Some)
    }

    /// Members in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.tree.iter().map(|(_, id)| *id)
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.members.clear();
    }
}
