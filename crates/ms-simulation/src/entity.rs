use std::collections::BTreeMap;
use std::fmt;

use ms_core::{EntityId, TIME_INFINITE, Time};

use crate::error::SimResult;
use crate::event::EventState;
use crate::model::EntityDecl;
use crate::simulation::Simulation;

/// Where an entity is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created; attributes may be initialised directly, no events armed.
    Created,
    /// Entered; events are scheduled and attribute changes propagate.
    Active,
    /// Exited; events are zombies and storage is released on the next
    /// scheduler pass.
    Exited,
}

/// Runtime bookkeeping embedded in every entity.
#[derive(Debug, Clone)]
pub struct EntityBase {
    id: EntityId,
    time: Time,
    lifecycle: Lifecycle,
    events: Vec<EventState>,
}

impl EntityBase {
    pub(crate) fn new(id: EntityId, time: Time, events: usize) -> Self {
        Self {
            id,
            time,
            lifecycle: Lifecycle::Created,
            events: vec![EventState::default(); events],
        }
    }

    pub(crate) fn null(events: usize) -> Self {
        Self::new(EntityId::NULL, 0.0, events)
    }

    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity's local clock.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Lifecycle stage.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns `true` while the entity is in the simulation.
    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Scheduling state of the event in declaration slot `slot`.
    pub fn event(&self, slot: usize) -> Option<&EventState> {
        self.events.get(slot)
    }

    pub(crate) fn set_time(&mut self, time: Time) {
        self.time = time;
    }

    pub(crate) fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    pub(crate) fn event_mut(&mut self, slot: usize) -> Option<&mut EventState> {
        self.events.get_mut(slot)
    }

    pub(crate) fn events_mut(&mut self) -> &mut [EventState] {
        &mut self.events
    }
}

/// A type of simulated entity.
///
/// Implementors are plain structs holding an [`EntityBase`] plus one field
/// per attribute, link and multilink. Attribute values are reached through
/// marker types implementing [`crate::Attribute`], never by field access
/// from model logic, so every change runs the notification protocol.
pub trait Entity: Sized + 'static {
    /// Type name for diagnostics.
    const KIND: &'static str;

    /// Construct an entity around its runtime bookkeeping, with every
    /// attribute at its default value. Also used for the null entity.
    fn new(base: EntityBase) -> Self;

    /// Runtime bookkeeping.
    fn base(&self) -> &EntityBase;

    /// Mutable runtime bookkeeping.
    fn base_mut(&mut self) -> &mut EntityBase;

    /// Declare events, derived attributes, links and entity sets.
    fn declare(decl: &mut EntityDecl<Self>) {
        let _ = decl;
    }

    /// Called after the entity's clock moved from `old` to `new`, once
    /// duration attributes have been advanced.
    fn time_changed(sim: &mut Simulation, id: EntityId, old: Time, new: Time) -> SimResult<()> {
        let _ = (sim, id, old, new);
        Ok(())
    }

    /// Latest time at which this entity's events may occur when event
    /// censoring is enabled.
    fn censor_time(sim: &Simulation, id: EntityId) -> SimResult<Time> {
        let _ = (sim, id);
        Ok(TIME_INFINITE)
    }
}

/// All entities of one type, plus that type's null entity.
pub struct Population<E> {
    live: BTreeMap<EntityId, E>,
    null: E,
}

impl<E: Entity> fmt::Debug for Population<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("kind", &E::KIND)
            .field("live", &self.live.len())
            .finish()
    }
}

impl<E: Entity> Population<E> {
    pub(crate) fn new(events: usize) -> Self {
        Self {
            live: BTreeMap::new(),
            null: E::new(EntityBase::null(events)),
        }
    }

    /// The live entity `id`, or the null entity for [`EntityId::NULL`].
    pub fn get(&self, id: EntityId) -> Option<&E> {
        if id.is_null() {
            Some(&self.null)
        } else {
            self.live.get(&id)
        }
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut E> {
        self.live.get_mut(&id)
    }

    pub(crate) fn insert(&mut self, entity: E) {
        self.live.insert(entity.base().id(), entity);
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<E> {
        self.live.remove(&id)
    }

    /// The null entity, every attribute at its default value.
    pub fn null(&self) -> &E {
        &self.null
    }

    /// Stored entities in id order, exited-but-unreleased ones included.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.live.values()
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no entities are stored.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
