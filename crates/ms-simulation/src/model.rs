//! Model schema: the entity types of a model and what each declares.
//!
//! Declarations are turned into tables of plain function pointers once, when
//! the model is built. The runtime dispatches through these tables, so a
//! [`ModelSchema`] is immutable, `Send + Sync`, and shared by every
//! replicate through an [`Arc`].

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ms_core::{EntityId, EntitySet, Time};
use tracing::debug;

use crate::attribute::{DurationAttribute, Identity};
use crate::entity::{Entity, EntityBase, Population};
use crate::entity_set::EntitySetDef;
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventTypeId};
use crate::link::{Link, LinkAttribute, MultilinkAttribute};
use crate::simulation::Simulation;

pub(crate) type EntityHook = fn(&mut Simulation, EntityId) -> SimResult<()>;
pub(crate) type AgeHook = fn(&mut Simulation, EntityId, Time) -> SimResult<()>;

#[derive(Clone, Copy)]
pub(crate) struct EventMeta {
    pub(crate) name: &'static str,
    pub(crate) id: EventTypeId,
    pub(crate) priority: i32,
    pub(crate) legacy_number: Option<u32>,
    pub(crate) type_id: TypeId,
    pub(crate) time: fn(&mut Simulation, EntityId, i32) -> SimResult<(Time, i32)>,
    pub(crate) implement: fn(&mut Simulation, EntityId, i32) -> SimResult<()>,
}

impl EventMeta {
    /// Weight of this event in the checksum: legacy number (or type id) + 1.
    pub(crate) fn checksum_weight(&self) -> f64 {
        f64::from(self.legacy_number.unwrap_or(self.id.0)) + 1.0
    }
}

pub(crate) struct SetMeta {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) create: fn() -> Box<dyn Any>,
    pub(crate) refresh: EntityHook,
    pub(crate) detach: EntityHook,
}

/// Dispatch table of one entity type.
pub(crate) struct KindMeta {
    pub(crate) name: &'static str,
    pub(crate) events: Vec<EventMeta>,
    pub(crate) slot_by_type: HashMap<TypeId, usize>,
    pub(crate) slot_by_id: HashMap<EventTypeId, usize>,
    pub(crate) identities: Vec<EntityHook>,
    pub(crate) durations: Vec<AgeHook>,
    pub(crate) links: Vec<EntityHook>,
    pub(crate) multilinks: Vec<EntityHook>,
    pub(crate) sets: Vec<SetMeta>,
    pub(crate) new_population: fn(usize) -> Box<dyn Any>,
    pub(crate) insert_new: fn(&mut dyn Any, EntityBase) -> bool,
    pub(crate) base_of: fn(&dyn Any, EntityId) -> Option<&EntityBase>,
    pub(crate) base_mut_of: fn(&mut dyn Any, EntityId) -> Option<&mut EntityBase>,
    pub(crate) release: fn(&mut dyn Any, EntityId) -> bool,
    pub(crate) time_changed: fn(&mut Simulation, EntityId, Time, Time) -> SimResult<()>,
    pub(crate) censor_time: fn(&Simulation, EntityId) -> SimResult<Time>,
}

impl KindMeta {
    pub(crate) fn event(&self, slot: usize) -> Option<&EventMeta> {
        self.events.get(slot)
    }
}

/// Collects what one entity type declares. Passed to [`Entity::declare`].
pub struct EntityDecl<E: Entity> {
    events: Vec<EventMeta>,
    identities: Vec<EntityHook>,
    durations: Vec<AgeHook>,
    links: Vec<EntityHook>,
    multilinks: Vec<EntityHook>,
    sets: Vec<SetMeta>,
    duplicate_event: Option<&'static str>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> fmt::Debug for EntityDecl<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDecl")
            .field("kind", &E::KIND)
            .field("events", &self.events.len())
            .field("identities", &self.identities.len())
            .field("durations", &self.durations.len())
            .field("links", &(self.links.len() + self.multilinks.len()))
            .field("sets", &self.sets.len())
            .finish()
    }
}

impl<E: Entity> EntityDecl<E> {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            identities: Vec::new(),
            durations: Vec::new(),
            links: Vec::new(),
            multilinks: Vec::new(),
            sets: Vec::new(),
            duplicate_event: None,
            _marker: PhantomData,
        }
    }

    /// Declare event `Ev`. Every entity of this type carries one instance.
    pub fn event<Ev: Event<Entity = E>>(&mut self) -> &mut Self {
        if self.events.iter().any(|e| e.name == Ev::NAME) {
            self.duplicate_event.get_or_insert(Ev::NAME);
            return self;
        }
        self.events.push(EventMeta {
            name: Ev::NAME,
            id: EventTypeId::default(),
            priority: Ev::PRIORITY,
            legacy_number: Ev::LEGACY_NUMBER,
            type_id: TypeId::of::<Ev>(),
            time: event_time::<Ev>,
            implement: event_implement::<Ev>,
        });
        self
    }

    /// Declare identity `I`, evaluated when an entity enters, in declaration
    /// order.
    pub fn identity<I: Identity<Entity = E>>(&mut self) -> &mut Self {
        self.identities.push(evaluate_identity::<I>);
        self
    }

    /// Declare duration `D`, advanced whenever an entity ages.
    pub fn duration<D: DurationAttribute<Entity = E>>(&mut self) -> &mut Self {
        self.durations.push(advance_duration::<D>);
        self
    }

    /// Declare link `L`, emptied when an entity exits.
    pub fn link<L: LinkAttribute<Entity = E>>(&mut self) -> &mut Self {
        self.links.push(clear_link::<L>);
        self
    }

    /// Declare multilink `M`, emptied when an entity exits.
    pub fn multilink<M: MultilinkAttribute<Entity = E>>(&mut self) -> &mut Self {
        self.multilinks.push(clear_multilink::<M>);
        self
    }

    /// Declare entity set `S`, refreshed on entry and left on exit.
    pub fn entity_set<S: EntitySetDef<Entity = E>>(&mut self) -> &mut Self {
        self.sets.push(SetMeta {
            type_id: TypeId::of::<S>(),
            name: S::NAME,
            create: new_set::<S>,
            refresh: refresh_set::<S>,
            detach: detach_from_set::<S>,
        });
        self
    }

    fn finish(self) -> SimResult<KindMeta> {
        if let Some(event) = self.duplicate_event {
            return Err(SimError::DuplicateEvent {
                entity_type: E::KIND,
                event,
            });
        }
        let slot_by_type = self
            .events
            .iter()
            .enumerate()
            .map(|(slot, e)| (e.type_id, slot))
            .collect();
        Ok(KindMeta {
            name: E::KIND,
            events: self.events,
            slot_by_type,
            slot_by_id: HashMap::new(),
            identities: self.identities,
            durations: self.durations,
            links: self.links,
            multilinks: self.multilinks,
            sets: self.sets,
            new_population: new_population::<E>,
            insert_new: insert_new::<E>,
            base_of: base_of::<E>,
            base_mut_of: base_mut_of::<E>,
            release: release::<E>,
            time_changed: E::time_changed,
            censor_time: E::censor_time,
        })
    }
}

fn event_time<Ev: Event>(sim: &mut Simulation, id: EntityId, memory: i32) -> SimResult<(Time, i32)> {
    Ev::time_with_memory(sim, id, memory)
}

fn event_implement<Ev: Event>(sim: &mut Simulation, id: EntityId, memory: i32) -> SimResult<()> {
    Ev::implement_with_memory(sim, id, memory)
}

fn evaluate_identity<I: Identity>(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
    sim.evaluate::<I>(id)
}

fn advance_duration<D: DurationAttribute>(
    sim: &mut Simulation,
    id: EntityId,
    delta: Time,
) -> SimResult<()> {
    sim.advance_duration::<D>(id, delta)
}

fn clear_link<L: LinkAttribute>(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
    sim.set_link::<L>(id, Link::NULL)
}

fn clear_multilink<M: MultilinkAttribute>(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
    sim.multilink_clear::<M>(id)
}

fn new_set<S: EntitySetDef>() -> Box<dyn Any> {
    Box::new(EntitySet::<S::Key>::new())
}

fn refresh_set<S: EntitySetDef>(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
    sim.refresh_set::<S>(id)
}

fn detach_from_set<S: EntitySetDef>(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
    sim.detach_from_set::<S>(id)
}

fn new_population<E: Entity>(events: usize) -> Box<dyn Any> {
    Box::new(Population::<E>::new(events))
}

fn insert_new<E: Entity>(pop: &mut dyn Any, base: EntityBase) -> bool {
    match pop.downcast_mut::<Population<E>>() {
        Some(pop) => {
            pop.insert(E::new(base));
            true
        }
        None => false,
    }
}

fn base_of<E: Entity>(pop: &dyn Any, id: EntityId) -> Option<&EntityBase> {
    pop.downcast_ref::<Population<E>>()?.get(id).map(E::base)
}

fn base_mut_of<E: Entity>(pop: &mut dyn Any, id: EntityId) -> Option<&mut EntityBase> {
    pop.downcast_mut::<Population<E>>()?
        .get_mut(id)
        .map(E::base_mut)
}

fn release<E: Entity>(pop: &mut dyn Any, id: EntityId) -> bool {
    pop.downcast_mut::<Population<E>>()
        .and_then(|p| p.remove(id))
        .is_some()
}

/// The immutable description of a model, shared by all its runs.
pub struct ModelSchema {
    name: String,
    kinds: Vec<KindMeta>,
    kind_by_type: HashMap<TypeId, usize>,
    event_names: Vec<&'static str>,
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("entity_types", &self.entity_types())
            .field("events", &self.event_names)
            .finish()
    }
}

impl ModelSchema {
    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered entity type names, in registration order.
    pub fn entity_types(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|k| k.name).collect()
    }

    /// All event names, sorted; the position of a name is its event type id.
    pub fn event_names(&self) -> &[&'static str] {
        &self.event_names
    }

    /// Id of the event named `name`.
    pub fn event_id(&self, name: &str) -> Option<EventTypeId> {
        self.event_names
            .iter()
            .position(|n| *n == name)
            .map(|i| EventTypeId(i as u32))
    }

    /// Name of event type `id`.
    pub fn event_name(&self, id: EventTypeId) -> Option<&'static str> {
        self.event_names.get(id.0 as usize).copied()
    }

    /// Id of event type `Ev` as assigned in this model.
    pub fn event_id_of<Ev: Event>(&self) -> SimResult<EventTypeId> {
        let kind = self.kind_index::<Ev::Entity>()?;
        self.kinds[kind]
            .slot_by_type
            .get(&TypeId::of::<Ev>())
            .map(|slot| self.kinds[kind].events[*slot].id)
            .ok_or(SimError::UnknownEvent {
                event: Ev::NAME,
                entity_type: <Ev::Entity as Entity>::KIND,
            })
    }

    pub(crate) fn kind_index<E: Entity>(&self) -> SimResult<usize> {
        self.kind_by_type
            .get(&TypeId::of::<E>())
            .copied()
            .ok_or(SimError::UnknownEntityType(E::KIND))
    }

    pub(crate) fn kinds(&self) -> &[KindMeta] {
        &self.kinds
    }

    pub(crate) fn kind(&self, index: usize) -> &KindMeta {
        &self.kinds[index]
    }
}

/// Registers the entity types of a model.
///
/// ```ignore
/// let schema = ModelBuilder::new("demo")
///     .entity::<Person>()
///     .entity::<Household>()
///     .build()?;
/// ```
pub struct ModelBuilder {
    name: String,
    kinds: Vec<KindMeta>,
    kind_by_type: HashMap<TypeId, usize>,
    error: Option<SimError>,
}

impl fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("name", &self.name)
            .field("entity_types", &self.kinds.len())
            .finish()
    }
}

impl ModelBuilder {
    /// Start a model named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kinds: Vec::new(),
            kind_by_type: HashMap::new(),
            error: None,
        }
    }

    /// Register entity type `E`. Registering a type twice has no effect.
    pub fn entity<E: Entity>(mut self) -> Self {
        if self.error.is_some() || self.kind_by_type.contains_key(&TypeId::of::<E>()) {
            return self;
        }
        let mut decl = EntityDecl::<E>::new();
        E::declare(&mut decl);
        match decl.finish() {
            Ok(meta) => {
                self.kind_by_type.insert(TypeId::of::<E>(), self.kinds.len());
                self.kinds.push(meta);
            }
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Assign event type ids and freeze the model.
    pub fn build(self) -> SimResult<Arc<ModelSchema>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut kinds = self.kinds;
        let event_names: Vec<&'static str> = kinds
            .iter()
            .flat_map(|k| k.events.iter().map(|e| e.name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for kind in &mut kinds {
            for (slot, event) in kind.events.iter_mut().enumerate() {
                let (Ok(pos) | Err(pos)) = event_names.binary_search(&event.name);
                event.id = EventTypeId(pos as u32);
                kind.slot_by_id.insert(event.id, slot);
            }
        }
        debug!(
            model = %self.name,
            entity_types = kinds.len(),
            events = event_names.len(),
            "model built"
        );
        Ok(Arc::new(ModelSchema {
            name: self.name,
            kinds,
            kind_by_type: self.kind_by_type,
            event_names,
        }))
    }
}
