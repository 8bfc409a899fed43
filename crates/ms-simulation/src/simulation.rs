use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use ms_core::time::is_finite_time;
use ms_core::{EntityId, EntityIdGenerator, ModelStatus, RunStateHandle, TIME_INFINITE, Time};
use tracing::{debug, error, trace, warn};

use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::entity::{Entity, EntityBase, Lifecycle, Population};
use crate::error::{
    CausalityKind, CurrentEvent, EventContext, InvariantViolation, SimError, SimResult,
};
use crate::event::{DirtyKey, Event, EventHandle, EventState, PRIORITY_SELF_SCHEDULING, QueueKey};
use crate::link::MultilinkUsage;
use crate::model::ModelSchema;
use crate::random::RandomStreams;
use crate::trace::{TraceKind, TraceLog, TraceRecord};

/// Events between two progress updates in [`Simulation::run`].
const PROGRESS_INTERVAL: u64 = 1000;

/// Totals of a run so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Events fired.
    pub events: u64,
    /// Global time.
    pub time: Time,
    /// Event checksum.
    pub checksum: f64,
    /// Entities still stored.
    pub entities: usize,
}

/// All state of one simulation run.
///
/// Holds the event queue, the dirty set, the global clock, every entity,
/// every entity set and the random streams. Nothing is shared between two
/// `Simulation` values except the read-only [`ModelSchema`], so replicates
/// can run on separate threads without locking.
pub struct Simulation {
    config: SimConfig,
    schema: Arc<ModelSchema>,
    populations: Vec<Box<dyn Any>>,
    kind_of: BTreeMap<EntityId, usize>,
    ids: EntityIdGenerator,
    clock: SimClock,
    queue: BTreeSet<QueueKey>,
    dirty: BTreeSet<DirtyKey>,
    retired: Vec<EntityId>,
    pub(crate) sets: HashMap<TypeId, Box<dyn Any>>,
    random: RandomStreams,
    trace: TraceLog,
    cleaning: bool,
    aging_depth: u32,
    current: Option<EventContext>,
    pub(crate) multilink_usage: MultilinkUsage,
    pub(crate) warned_multilinks: HashSet<TypeId>,
    initialized: bool,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("model", &self.schema.name())
            .field("time", &self.clock.time())
            .field("events", &self.clock.events())
            .field("entities", &self.kind_of.len())
            .field("queued", &self.queue.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

impl Simulation {
    /// Create a run of `schema` with `config`. Call
    /// [`Simulation::initialize_runtime`] before creating entities.
    pub fn new(schema: Arc<ModelSchema>, config: SimConfig) -> Self {
        let random = RandomStreams::new(config.seed, config.member);
        let trace = TraceLog::new(config.max_trace_records);
        let mut sim = Self {
            config,
            schema,
            populations: Vec::new(),
            kind_of: BTreeMap::new(),
            ids: EntityIdGenerator::new(),
            clock: SimClock::new(),
            queue: BTreeSet::new(),
            dirty: BTreeSet::new(),
            retired: Vec::new(),
            sets: HashMap::new(),
            random,
            trace,
            cleaning: false,
            aging_depth: 0,
            current: None,
            multilink_usage: MultilinkUsage::default(),
            warned_multilinks: HashSet::new(),
            initialized: false,
        };
        sim.reset_storage();
        sim
    }

    fn reset_storage(&mut self) {
        self.populations = self
            .schema
            .kinds()
            .iter()
            .map(|k| (k.new_population)(k.events.len()))
            .collect();
        self.sets = self
            .schema
            .kinds()
            .iter()
            .flat_map(|k| k.sets.iter())
            .map(|s| (s.type_id, (s.create)()))
            .collect();
        self.kind_of.clear();
        self.ids = EntityIdGenerator::new();
        self.queue.clear();
        self.dirty.clear();
        self.retired.clear();
        self.clock.reset();
        self.random.reset();
        self.trace.clear();
        self.cleaning = false;
        self.aging_depth = 0;
        self.current = None;
        self.multilink_usage = MultilinkUsage::default();
        self.warned_multilinks.clear();
    }

    /// Reset the clock, counters, checksum, queue and all entities.
    pub fn initialize_runtime(&mut self) -> SimResult<()> {
        self.reset_storage();
        self.initialized = true;
        if self.config.allow_time_travel {
            warn!(model = %self.schema.name(), "time travel is allowed");
        }
        if self.config.allow_clairvoyance {
            warn!(model = %self.schema.name(), "clairvoyance is allowed");
        }
        debug!(
            model = %self.schema.name(),
            seed = self.config.seed,
            member = self.config.member,
            policy = ?self.config.time_policy,
            "simulation runtime initialized"
        );
        Ok(())
    }

    /// Exit every remaining entity and release all storage.
    pub fn finalize_runtime(&mut self) -> SimResult<()> {
        self.ensure_initialized()?;
        let ids: Vec<EntityId> = self.kind_of.keys().copied().collect();
        for id in ids {
            if self.base(id)?.is_active() {
                self.exit_simulation(id)?;
            }
        }
        self.clean_all()?;
        self.free_all_zombies();
        self.initialized = false;
        debug!(
            model = %self.schema.name(),
            events = self.clock.events(),
            checksum = self.clock.checksum(),
            time = self.clock.time(),
            "simulation runtime finalized"
        );
        Ok(())
    }

    fn ensure_initialized(&self) -> SimResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(InvariantViolation::NotInitialized.into())
        }
    }

    /// Run configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Model schema.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Global time.
    pub fn global_time(&self) -> Time {
        self.clock.time()
    }

    /// Move the global clock. Entity clocks are not touched.
    pub fn set_global_time(&mut self, time: Time) {
        self.clock.set_time(time);
    }

    /// Number of events fired.
    pub fn event_counter(&self) -> u64 {
        self.clock.events()
    }

    /// Accumulated event checksum.
    pub fn event_checksum(&self) -> f64 {
        self.clock.checksum()
    }

    /// Random streams of this run.
    pub fn random(&mut self) -> &mut RandomStreams {
        &mut self.random
    }

    /// Trace log; empty unless `event_trace` is enabled.
    pub fn trace_log(&self) -> &TraceLog {
        &self.trace
    }

    /// The event fired most recently.
    pub fn current_event(&self) -> Option<&EventContext> {
        self.current.as_ref()
    }

    /// Totals so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            events: self.clock.events(),
            time: self.clock.time(),
            checksum: self.clock.checksum(),
            entities: self.kind_of.len(),
        }
    }

    pub(crate) fn record(&mut self, kind: TraceKind) {
        if self.config.event_trace {
            self.trace.push(TraceRecord {
                time: self.clock.time(),
                event_counter: self.clock.events(),
                kind,
            });
        }
    }

    pub(crate) fn causality(
        &self,
        violation: CausalityKind,
        entity: EntityId,
        entity_time: Time,
        target_time: Time,
    ) -> SimError {
        let err = SimError::Causality {
            violation,
            event: CurrentEvent(self.current.clone()),
            entity,
            entity_time,
            target_time,
            member: self.config.member,
            seed: self.config.seed,
        };
        error!(error = %err, "causality violation");
        err
    }

    pub(crate) fn check_modification(
        &self,
        attribute: &'static str,
        entity: EntityId,
    ) -> SimResult<()> {
        if self.cleaning && self.aging_depth == 0 && self.config.verify_attribute_modification {
            return Err(InvariantViolation::AttributeModificationDuringClean { attribute, entity }.into());
        }
        Ok(())
    }

    // ---- entities ----

    fn kind_index_of(&self, id: EntityId) -> SimResult<usize> {
        self.kind_of
            .get(&id)
            .copied()
            .ok_or(SimError::EntityNotFound(id))
    }

    fn population<E: Entity>(&self) -> SimResult<&Population<E>> {
        let kind = self.schema.kind_index::<E>()?;
        self.populations[kind]
            .downcast_ref::<Population<E>>()
            .ok_or(SimError::UnknownEntityType(E::KIND))
    }

    fn population_mut<E: Entity>(&mut self) -> SimResult<&mut Population<E>> {
        let kind = self.schema.kind_index::<E>()?;
        self.populations[kind]
            .downcast_mut::<Population<E>>()
            .ok_or(SimError::UnknownEntityType(E::KIND))
    }

    fn check_kind<E: Entity>(&self, id: EntityId) -> SimResult<()> {
        let expected = self.schema.kind_index::<E>()?;
        let actual = self.kind_index_of(id)?;
        if expected == actual {
            Ok(())
        } else {
            Err(SimError::WrongEntityType {
                id,
                expected: E::KIND,
                actual: self.schema.kind(actual).name,
            })
        }
    }

    /// Entity `id` of type `E`. The null id yields the null entity.
    pub fn entity<E: Entity>(&self, id: EntityId) -> SimResult<&E> {
        if !id.is_null() {
            self.check_kind::<E>(id)?;
        }
        self.population::<E>()?
            .get(id)
            .ok_or(SimError::EntityNotFound(id))
    }

    pub(crate) fn entity_mut<E: Entity>(&mut self, id: EntityId) -> SimResult<&mut E> {
        if id.is_null() {
            return Err(InvariantViolation::NullEntityWrite(E::KIND).into());
        }
        self.check_kind::<E>(id)?;
        self.population_mut::<E>()?
            .get_mut(id)
            .ok_or(SimError::EntityNotFound(id))
    }

    /// The null entity of type `E`: every attribute at its default value.
    pub fn null_entity<E: Entity>(&self) -> SimResult<&E> {
        Ok(self.population::<E>()?.null())
    }

    /// Runtime bookkeeping of entity `id`, whatever its type.
    pub fn base(&self, id: EntityId) -> SimResult<&EntityBase> {
        let kind = self.kind_index_of(id)?;
        let base_of = self.schema.kind(kind).base_of;
        base_of(&*self.populations[kind], id).ok_or(SimError::EntityNotFound(id))
    }

    fn base_mut(&mut self, id: EntityId) -> SimResult<&mut EntityBase> {
        let kind = self.kind_index_of(id)?;
        let base_mut_of = self.schema.kind(kind).base_mut_of;
        base_mut_of(&mut *self.populations[kind], id).ok_or(SimError::EntityNotFound(id))
    }

    /// Local clock of entity `id`.
    pub fn entity_time(&self, id: EntityId) -> SimResult<Time> {
        Ok(self.base(id)?.time())
    }

    /// Active entities of type `E`, in id order.
    pub fn live_entities<E: Entity>(&self) -> SimResult<Vec<EntityId>> {
        Ok(self
            .population::<E>()?
            .iter()
            .map(Entity::base)
            .filter(|b| b.is_active())
            .map(EntityBase::id)
            .collect())
    }

    /// Number of stored entities of all types.
    pub fn entity_count(&self) -> usize {
        self.kind_of.len()
    }

    /// Create an entity of type `E` at the global time. It does not take
    /// part in the simulation until [`Simulation::enter_simulation`].
    pub fn create<E: Entity>(&mut self) -> SimResult<EntityId> {
        self.ensure_initialized()?;
        let kind = self.schema.kind_index::<E>()?;
        let id = self.ids.next_id();
        let meta = self.schema.kind(kind);
        let base = EntityBase::new(id, self.clock.time(), meta.events.len());
        let insert_new = meta.insert_new;
        if !insert_new(&mut *self.populations[kind], base) {
            return Err(SimError::UnknownEntityType(E::KIND));
        }
        self.kind_of.insert(id, kind);
        trace!(entity = %id, kind = E::KIND, "entity created");
        Ok(id)
    }

    /// Create an entity, let `init` set its starting values directly, and
    /// enter it into the simulation.
    pub fn spawn<E: Entity>(&mut self, init: impl FnOnce(&mut E)) -> SimResult<EntityId> {
        let id = self.create::<E>()?;
        init(self.entity_mut::<E>(id)?);
        self.enter_simulation(id)?;
        Ok(id)
    }

    /// Set the clock of an entity that has not entered yet.
    pub fn initialize_entity_time(&mut self, id: EntityId, time: Time) -> SimResult<()> {
        let base = self.base_mut(id)?;
        if base.lifecycle() != Lifecycle::Created {
            return Err(InvariantViolation::AlreadyEntered(id).into());
        }
        base.set_time(time);
        Ok(())
    }

    /// Evaluate identities, join entity sets and schedule every event of
    /// entity `id`.
    pub fn enter_simulation(&mut self, id: EntityId) -> SimResult<()> {
        let kind = self.kind_index_of(id)?;
        let base = self.base_mut(id)?;
        match base.lifecycle() {
            Lifecycle::Created => base.set_lifecycle(Lifecycle::Active),
            Lifecycle::Active => return Err(InvariantViolation::AlreadyEntered(id).into()),
            Lifecycle::Exited => return Err(InvariantViolation::EntityNotActive(id).into()),
        }
        for state in base.events_mut() {
            state.initialize();
        }

        let schema = Arc::clone(&self.schema);
        let meta = schema.kind(kind);
        for identity in &meta.identities {
            identity(self, id)?;
        }
        for set in &meta.sets {
            trace!(entity = %id, set = set.name, "joining entity set");
            (set.refresh)(self, id)?;
        }
        for slot in 0..meta.events.len() {
            self.make_dirty_slot(id, kind, slot)?;
        }

        debug!(entity = %id, kind = meta.name, time = self.entity_time(id)?, "entity entered");
        self.record(TraceKind::EntityEntered {
            entity: id,
            kind: meta.name,
        });
        Ok(())
    }

    /// Retire entity `id`: its events become zombies, its links and
    /// multilinks are emptied and it leaves its entity sets. Storage is
    /// released on the next scheduler pass.
    pub fn exit_simulation(&mut self, id: EntityId) -> SimResult<()> {
        let kind = self.kind_index_of(id)?;
        if !self.base(id)?.is_active() {
            return Err(InvariantViolation::EntityNotActive(id).into());
        }
        let schema = Arc::clone(&self.schema);
        let meta = schema.kind(kind);
        for slot in 0..meta.events.len() {
            self.make_zombie_slot(id, kind, slot)?;
        }
        for clear in meta.links.iter().chain(&meta.multilinks) {
            clear(self, id)?;
        }
        for set in &meta.sets {
            (set.detach)(self, id)?;
        }
        self.base_mut(id)?.set_lifecycle(Lifecycle::Exited);
        self.retired.push(id);

        debug!(entity = %id, kind = meta.name, time = self.clock.time(), "entity exited");
        self.record(TraceKind::EntityExited {
            entity: id,
            kind: meta.name,
        });
        Ok(())
    }

    fn free_all_zombies(&mut self) {
        for id in std::mem::take(&mut self.retired) {
            let Some(kind) = self.kind_of.remove(&id) else {
                continue;
            };
            let release = self.schema.kind(kind).release;
            if release(&mut *self.populations[kind], id) {
                trace!(entity = %id, "entity released");
            }
        }
    }

    // ---- time ----

    /// Age entity `id` to time `t`, advancing its durations and then
    /// calling [`Entity::time_changed`].
    ///
    /// Moving backward is a causality violation unless time travel is
    /// allowed.
    pub fn age_to(&mut self, id: EntityId, t: Time) -> SimResult<()> {
        let old = self.entity_time(id)?;
        if t == old {
            return Ok(());
        }
        if t < old && !self.config.allow_time_travel {
            return Err(self.causality(CausalityKind::AgedBackward, id, old, t));
        }
        let kind = self.kind_index_of(id)?;
        self.base_mut(id)?.set_time(t);
        self.aging_depth += 1;
        let result = self.run_aging_hooks(id, kind, old, t);
        self.aging_depth -= 1;
        result
    }

    fn run_aging_hooks(&mut self, id: EntityId, kind: usize, old: Time, new: Time) -> SimResult<()> {
        let schema = Arc::clone(&self.schema);
        let meta = schema.kind(kind);
        for advance in &meta.durations {
            advance(self, id, new - old)?;
        }
        (meta.time_changed)(self, id, old, new)
    }

    /// Age every active entity to `t`, in id order.
    pub fn age_all_entities(&mut self, t: Time) -> SimResult<()> {
        let ids: Vec<EntityId> = self.kind_of.keys().copied().collect();
        for id in ids {
            if self.base(id)?.is_active() {
                self.age_to(id, t)?;
            }
        }
        Ok(())
    }

    // ---- events ----

    fn event_slot<Ev: Event>(&self, id: EntityId) -> SimResult<(usize, usize)> {
        self.check_kind::<Ev::Entity>(id)?;
        let kind = self.schema.kind_index::<Ev::Entity>()?;
        let slot = self
            .schema
            .kind(kind)
            .slot_by_type
            .get(&TypeId::of::<Ev>())
            .copied()
            .ok_or(SimError::UnknownEvent {
                event: Ev::NAME,
                entity_type: <Ev::Entity as Entity>::KIND,
            })?;
        Ok((kind, slot))
    }

    fn event_state_at(&self, id: EntityId, slot: usize) -> SimResult<EventState> {
        self.base(id)?
            .event(slot)
            .copied()
            .ok_or(SimError::EntityNotFound(id))
    }

    fn event_state_mut(&mut self, id: EntityId, slot: usize) -> SimResult<&mut EventState> {
        self.base_mut(id)?
            .event_mut(slot)
            .ok_or(SimError::EntityNotFound(id))
    }

    /// Scheduling state of event `Ev` of entity `id`.
    pub fn event_state<Ev: Event>(&self, id: EntityId) -> SimResult<EventState> {
        let (_, slot) = self.event_slot::<Ev>(id)?;
        self.event_state_at(id, slot)
    }

    /// Mark event `Ev` of `id` for recomputation. Does nothing unless the
    /// entity is active, and nothing for an event already dirty or a zombie.
    pub fn make_dirty<Ev: Event>(&mut self, id: EntityId) -> SimResult<()> {
        let (kind, slot) = self.event_slot::<Ev>(id)?;
        self.make_dirty_slot(id, kind, slot)
    }

    /// Mark event `Ev` of `id` for removal from the queue.
    pub fn make_zombie<Ev: Event>(&mut self, id: EntityId) -> SimResult<()> {
        let (kind, slot) = self.event_slot::<Ev>(id)?;
        self.make_zombie_slot(id, kind, slot)
    }

    fn make_dirty_slot(&mut self, id: EntityId, kind: usize, slot: usize) -> SimResult<()> {
        let Some(meta) = self.schema.kind(kind).event(slot).copied() else {
            return Ok(());
        };
        let base = self.base_mut(id)?;
        if !base.is_active() {
            return Ok(());
        }
        let Some(state) = base.event_mut(slot) else {
            return Ok(());
        };
        if state.zombie || state.dirty {
            return Ok(());
        }
        state.dirty = true;
        self.dirty.insert(DirtyKey::new(meta.priority, meta.id, id));
        Ok(())
    }

    fn make_zombie_slot(&mut self, id: EntityId, kind: usize, slot: usize) -> SimResult<()> {
        let Some(meta) = self.schema.kind(kind).event(slot).copied() else {
            return Ok(());
        };
        let state = self.event_state_mut(id, slot)?;
        if state.zombie {
            return Ok(());
        }
        state.zombie = true;
        self.dirty.insert(DirtyKey::new(meta.priority, meta.id, id));
        Ok(())
    }

    /// Number of events in the queue.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of events awaiting recomputation.
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Queued events in firing order.
    pub fn queued(&self) -> impl Iterator<Item = &QueueKey> {
        self.queue.iter()
    }

    /// Recompute every dirty event and drop every zombie, until the dirty
    /// set is empty. Assigning attributes meanwhile is rejected.
    pub fn clean_all(&mut self) -> SimResult<()> {
        let nested = self.cleaning;
        self.cleaning = true;
        let result = self.drain_dirty();
        self.cleaning = nested;
        result
    }

    fn drain_dirty(&mut self) -> SimResult<()> {
        while let Some(key) = self.dirty.pop_first() {
            self.clean(key)?;
        }
        Ok(())
    }

    fn clean(&mut self, key: DirtyKey) -> SimResult<()> {
        let id = key.entity();
        let kind = self.kind_index_of(id)?;
        let schema = Arc::clone(&self.schema);
        let kind_meta = schema.kind(kind);
        let Some(slot) = kind_meta.slot_by_id.get(&key.event()).copied() else {
            return Ok(());
        };
        let meta = kind_meta.events[slot];
        let state = self.event_state_at(id, slot)?;

        if state.zombie {
            if state.in_queue {
                self.queue
                    .remove(&QueueKey::new(state.time, meta.priority, meta.id, id));
            }
            let state = self.event_state_mut(id, slot)?;
            state.in_queue = false;
            state.dirty = false;
            trace!(event = meta.name, entity = %id, "zombie event dropped");
            return Ok(());
        }
        if !state.dirty {
            return Ok(());
        }

        let (new_time, memory) = (meta.time)(self, id, state.memory)?;
        if new_time.is_nan() {
            return Err(InvariantViolation::NanEventTime(EventContext {
                name: meta.name,
                id: meta.id,
                entity: id,
            })
            .into());
        }
        let censored = new_time == TIME_INFINITE
            || (self.config.censor_event_time && new_time > (kind_meta.censor_time)(self, id)?);

        let state = self.event_state_at(id, slot)?;
        if state.in_queue && (new_time != state.time || censored) {
            self.queue
                .remove(&QueueKey::new(state.time, meta.priority, meta.id, id));
        }
        if !censored {
            self.queue
                .insert(QueueKey::new(new_time, meta.priority, meta.id, id));
        }
        let state = self.event_state_mut(id, slot)?;
        state.time = new_time;
        state.memory = memory;
        state.in_queue = !censored;
        state.dirty = false;
        trace!(event = meta.name, entity = %id, time = new_time, censored, "event cleaned");
        Ok(())
    }

    /// Time of the next event, [`TIME_INFINITE`] when none is scheduled.
    pub fn time_next_event(&mut self) -> SimResult<Time> {
        self.ensure_initialized()?;
        self.clean_all()?;
        self.free_all_zombies();
        Ok(self.queue.first().map_or(TIME_INFINITE, QueueKey::time))
    }

    /// The next event to fire, without firing it.
    pub fn peek_next_event(&mut self) -> SimResult<Option<EventHandle>> {
        self.ensure_initialized()?;
        self.clean_all()?;
        self.free_all_zombies();
        let Some(key) = self.queue.first().copied() else {
            return Ok(None);
        };
        let name = self.schema.event_name(key.event()).unwrap_or_default();
        Ok(Some(EventHandle {
            name,
            id: key.event(),
            entity: key.entity(),
            time: key.time(),
            priority: key.priority(),
        }))
    }

    /// Fire the next event. Returns `false` when no event is scheduled.
    pub fn do_next_event(&mut self) -> SimResult<bool> {
        self.ensure_initialized()?;
        self.clean_all()?;
        self.free_all_zombies();
        let Some(key) = self.queue.first().copied() else {
            return Ok(false);
        };

        let id = key.entity();
        let kind = self.kind_index_of(id)?;
        let schema = Arc::clone(&self.schema);
        let kind_meta = schema.kind(kind);
        let slot = kind_meta
            .slot_by_id
            .get(&key.event())
            .copied()
            .ok_or(SimError::EntityNotFound(id))?;
        let meta = kind_meta.events[slot];
        let context = EventContext {
            name: meta.name,
            id: meta.id,
            entity: id,
        };
        let time = key.time();
        if !is_finite_time(time) {
            return Err(InvariantViolation::NonFiniteEvent(context).into());
        }
        self.current = Some(context);
        if time < self.clock.time() && !self.config.allow_time_travel {
            return Err(self.causality(CausalityKind::EventInPast, id, self.clock.time(), time));
        }

        let count = self.clock.fire(time);
        if self.config.just_in_time() {
            self.age_to(id, time)?;
        } else {
            self.age_all_entities(time)?;
        }
        if self.config.event_checksum && meta.priority != PRIORITY_SELF_SCHEDULING {
            self.clock.accumulate(time, meta.checksum_weight());
        }

        trace!(event = meta.name, entity = %id, time, count, "event fired");
        self.record(TraceKind::EventFired {
            event: meta.name,
            id: meta.id,
            entity: id,
        });
        let memory = self.event_state_at(id, slot)?.memory;
        (meta.implement)(self, id, memory)?;
        self.make_dirty_slot(id, kind, slot)?;
        Ok(true)
    }

    /// Fire events while the next one is due at or before `horizon`.
    /// Returns the number fired.
    pub fn run_until(&mut self, horizon: Time) -> SimResult<u64> {
        let start = self.clock.events();
        loop {
            let next = self.time_next_event()?;
            if !is_finite_time(next) || next > horizon {
                break;
            }
            if !self.do_next_event()? {
                break;
            }
        }
        Ok(self.clock.events() - start)
    }

    /// [`Simulation::run_until`] reporting status and progress to `state`.
    ///
    /// The status ends as [`ModelStatus::Done`] or, when the run fails,
    /// [`ModelStatus::Error`].
    pub fn run(&mut self, state: &RunStateHandle, horizon: Time) -> SimResult<RunSummary> {
        state.set_status(ModelStatus::Progress);
        let result = self.run_reporting(state, horizon);
        let summary = self.summary();
        state.update_progress(summary.events as i64, summary.time);
        match result {
            Ok(()) => {
                state.set_status(ModelStatus::Done);
                Ok(summary)
            }
            Err(err) => {
                state.set_status(ModelStatus::Error);
                Err(err)
            }
        }
    }

    fn run_reporting(&mut self, state: &RunStateHandle, horizon: Time) -> SimResult<()> {
        loop {
            let next = self.time_next_event()?;
            if !is_finite_time(next) || next > horizon || !self.do_next_event()? {
                return Ok(());
            }
            let events = self.clock.events();
            if events % PROGRESS_INTERVAL == 0 {
                state.update_progress(events as i64, self.clock.time());
            }
        }
    }
}
