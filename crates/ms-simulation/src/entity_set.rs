use std::any::TypeId;
use std::fmt;

use ms_core::{EntityId, EntitySet};

use crate::entity::Entity;
use crate::error::{SimError, SimResult};
use crate::simulation::Simulation;

/// A dynamically maintained, ordered set of entities of one type.
///
/// Members are the active entities for which [`filter`] holds, ordered by
/// [`key`] and then by entity id. Use `()` as the key for creation order.
/// The model keeps a set current by calling [`Simulation::refresh_set`]
/// from the side effects of every attribute the filter or key reads.
///
/// [`filter`]: EntitySetDef::filter
/// [`key`]: EntitySetDef::key
pub trait EntitySetDef: 'static {
    /// Entity type of the members.
    type Entity: Entity;

    /// Ordering key.
    type Key: Ord + Clone + fmt::Debug + 'static;

    /// Set name for diagnostics.
    const NAME: &'static str;

    /// Whether `id` belongs in the set.
    fn filter(sim: &mut Simulation, id: EntityId) -> SimResult<bool> {
        let _ = (sim, id);
        Ok(true)
    }

    /// Ordering key of `id`.
    fn key(sim: &mut Simulation, id: EntityId) -> SimResult<Self::Key>;
}

impl Simulation {
    fn set_storage<S: EntitySetDef>(&self) -> SimResult<&EntitySet<S::Key>> {
        self.sets
            .get(&TypeId::of::<S>())
            .and_then(|s| s.downcast_ref::<EntitySet<S::Key>>())
            .ok_or(SimError::UnknownEntitySet(S::NAME))
    }

    fn set_storage_mut<S: EntitySetDef>(&mut self) -> SimResult<&mut EntitySet<S::Key>> {
        self.sets
            .get_mut(&TypeId::of::<S>())
            .and_then(|s| s.downcast_mut::<EntitySet<S::Key>>())
            .ok_or(SimError::UnknownEntitySet(S::NAME))
    }

    /// Bring `id`'s membership and position in set `S` up to date.
    pub fn refresh_set<S: EntitySetDef>(&mut self, id: EntityId) -> SimResult<()> {
        if !self.base(id)?.is_active() || !S::filter(self, id)? {
            return self.detach_from_set::<S>(id);
        }
        let key = S::key(self, id)?;
        self.set_storage_mut::<S>()?.insert(id, key)?;
        Ok(())
    }

    /// Take `id` out of set `S`.
    pub fn detach_from_set<S: EntitySetDef>(&mut self, id: EntityId) -> SimResult<()> {
        self.set_storage_mut::<S>()?.erase(id);
        Ok(())
    }

    /// Number of members of set `S`.
    pub fn set_size<S: EntitySetDef>(&self) -> SimResult<usize> {
        Ok(self.set_storage::<S>()?.len())
    }

    /// Returns `true` if `id` is a member of set `S`.
    pub fn set_contains<S: EntitySetDef>(&self, id: EntityId) -> SimResult<bool> {
        Ok(self.set_storage::<S>()?.contains(id))
    }

    /// Member of set `S` at one-based `rank`; the null entity when out of
    /// range.
    pub fn set_at<S: EntitySetDef>(&self, rank: usize) -> SimResult<EntityId> {
        Ok(self
            .set_storage::<S>()?
            .at(rank)
            .unwrap_or(EntityId::NULL))
    }

    /// One-based rank of `id` in set `S`, 0 if it is not a member.
    pub fn set_rank<S: EntitySetDef>(&self, id: EntityId) -> SimResult<usize> {
        Ok(self.set_storage::<S>()?.rank(id))
    }

    /// Member of set `S` at zero-based `index`. Out of range is an error.
    pub fn set_select<S: EntitySetDef>(&self, index: usize) -> SimResult<EntityId> {
        Ok(self.set_storage::<S>()?.select(index)?)
    }

    /// Member of set `S` picked with a uniform `draw` in `[0, 1)`; the null
    /// entity when the set is empty.
    pub fn set_random_pick<S: EntitySetDef>(&self, draw: f64) -> SimResult<EntityId> {
        Ok(self
            .set_storage::<S>()?
            .random_pick(draw)?
            .unwrap_or(EntityId::NULL))
    }

    /// Member of set `S` picked with a draw from random `stream`.
    pub fn set_random_member<S: EntitySetDef>(&mut self, stream: u32) -> SimResult<EntityId> {
        let draw = self.random().uniform(stream);
        self.set_random_pick::<S>(draw)
    }

    /// Members of set `S` in order.
    pub fn set_members<S: EntitySetDef>(&self) -> SimResult<Vec<EntityId>> {
        Ok(self.set_storage::<S>()?.iter().collect())
    }
}
