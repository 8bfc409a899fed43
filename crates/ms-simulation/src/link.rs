//! Links between entities.
//!
//! A [`Link`] refers to at most one entity, a [`Multilink`] to any number.
//! Each link or multilink attribute names a [`Reciprocal`]: the member on
//! the far side that must mirror it. Changing one side runs the attribute
//! protocol on that side and then connects or disconnects the far side
//! through the same protocol, so both sides converge within one call.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use ms_core::{EntityId, LinkSlots, SlotInsert};
use tracing::{trace, warn};

use crate::entity::{Entity, Lifecycle};
use crate::error::{CausalityKind, SimError, SimResult};
use crate::simulation::Simulation;
use crate::trace::TraceKind;

/// Reference to at most one entity of type `B`.
pub struct Link<B> {
    target: EntityId,
    _marker: PhantomData<fn() -> B>,
}

impl<B> Link<B> {
    /// The empty link.
    pub const NULL: Self = Self {
        target: EntityId::NULL,
        _marker: PhantomData,
    };

    /// A link to `target`.
    pub fn to(target: EntityId) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    /// The target, or `None` for an empty link.
    pub fn get(self) -> Option<EntityId> {
        if self.target.is_null() {
            None
        } else {
            Some(self.target)
        }
    }

    /// The target id; [`EntityId::NULL`] for an empty link.
    pub fn id(self) -> EntityId {
        self.target
    }

    /// Returns `true` for an empty link.
    pub fn is_null(self) -> bool {
        self.target.is_null()
    }
}

impl<B> Clone for Link<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for Link<B> {}

impl<B> PartialEq for Link<B> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<B> Eq for Link<B> {}

impl<B> Default for Link<B> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<B> fmt::Debug for Link<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({})", self.target)
    }
}

/// Unordered references to entities of type `B`.
///
/// Read-only from model code; changes go through
/// [`Simulation::multilink_insert`] and friends.
pub struct Multilink<B> {
    slots: LinkSlots,
    _marker: PhantomData<fn() -> B>,
}

impl<B> Multilink<B> {
    /// An empty multilink.
    pub fn new() -> Self {
        Self {
            slots: LinkSlots::new(),
            _marker: PhantomData,
        }
    }

    /// Number of linked entities.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is linked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if `id` is linked.
    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains(id)
    }

    /// Linked entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter()
    }

    /// Linked ids as a comma-separated list.
    pub fn contents(&self) -> String {
        self.slots.contents()
    }
}

impl<B> Default for Multilink<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for Multilink<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multilink[{}]", self.slots.contents())
    }
}

/// The far side of a link or multilink.
pub trait Reciprocal: 'static {
    /// Entity type holding the far side.
    type Owner: Entity;

    /// Make `owner`'s side refer to `other`.
    fn connect(sim: &mut Simulation, owner: EntityId, other: EntityId) -> SimResult<()>;

    /// Make `owner`'s side stop referring to `other`.
    fn disconnect(sim: &mut Simulation, owner: EntityId, other: EntityId) -> SimResult<()>;
}

/// A far side a multilink may pair with.
///
/// Every multilink needs one, so that a target leaving the simulation also
/// leaves the multilinks holding it. [`NoReciprocal`] does not qualify:
///
/// ```compile_fail
/// use ms_simulation::{Entity, EntityBase, MultilinkReciprocal, NoReciprocal};
///
/// struct Stone {
///     base: EntityBase,
/// }
///
/// impl Entity for Stone {
///     const KIND: &'static str = "Stone";
///     fn new(base: EntityBase) -> Self {
///         Self { base }
///     }
///     fn base(&self) -> &EntityBase {
///         &self.base
///     }
///     fn base_mut(&mut self) -> &mut EntityBase {
///         &mut self.base
///     }
/// }
///
/// fn pairs_with_multilink<R: MultilinkReciprocal>() {}
///
/// pairs_with_multilink::<NoReciprocal<Stone>>();
/// ```
pub trait MultilinkReciprocal: Reciprocal {}

/// A link attribute of an entity.
pub trait LinkAttribute: 'static {
    /// Entity type holding the link.
    type Entity: Entity;

    /// Entity type linked to.
    type Target: Entity;

    /// Far side kept consistent with this link.
    type Reciprocal: Reciprocal<Owner = Self::Target>;

    /// Link name for diagnostics.
    const NAME: &'static str;

    /// The cell inside an entity.
    fn cell(entity: &Self::Entity) -> &Link<Self::Target>;

    /// The cell inside an entity, mutably.
    fn cell_mut(entity: &mut Self::Entity) -> &mut Link<Self::Target>;

    /// Runs before a change.
    fn notify(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let _ = (sim, id);
        Ok(())
    }

    /// Runs after a change and after the far side has been updated.
    fn side_effects(
        sim: &mut Simulation,
        id: EntityId,
        old: Link<Self::Target>,
        new: Link<Self::Target>,
    ) -> SimResult<()> {
        let _ = (sim, id, old, new);
        Ok(())
    }
}

/// A multilink attribute of an entity.
pub trait MultilinkAttribute: 'static {
    /// Entity type holding the multilink.
    type Entity: Entity;

    /// Entity type linked to.
    type Target: Entity;

    /// Far side kept consistent with this multilink.
    type Reciprocal: MultilinkReciprocal<Owner = Self::Target>;

    /// Multilink name for diagnostics.
    const NAME: &'static str;

    /// The cell inside an entity.
    fn cell(entity: &Self::Entity) -> &Multilink<Self::Target>;

    /// The cell inside an entity, mutably.
    fn cell_mut(entity: &mut Self::Entity) -> &mut Multilink<Self::Target>;

    /// Runs after every change.
    fn side_effects(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let _ = (sim, id);
        Ok(())
    }
}

/// Far side that is a single link `L`.
pub struct LinkSide<L>(PhantomData<fn() -> L>);

impl<L: LinkAttribute> Reciprocal for LinkSide<L> {
    type Owner = L::Entity;

    fn connect(sim: &mut Simulation, owner: EntityId, other: EntityId) -> SimResult<()> {
        sim.set_link::<L>(owner, Link::to(other))
    }

    fn disconnect(sim: &mut Simulation, owner: EntityId, other: EntityId) -> SimResult<()> {
        if sim.link::<L>(owner)?.id() == other {
            sim.set_link::<L>(owner, Link::NULL)
        } else {
            Ok(())
        }
    }
}

impl<L: LinkAttribute> MultilinkReciprocal for LinkSide<L> {}

/// Far side that is a multilink `M`.
pub struct MultilinkSide<M>(PhantomData<fn() -> M>);

impl<M: MultilinkAttribute> Reciprocal for MultilinkSide<M> {
    type Owner = M::Entity;

    fn connect(sim: &mut Simulation, owner: EntityId, other: EntityId) -> SimResult<()> {
        sim.multilink_insert::<M>(owner, other)
    }

    fn disconnect(sim: &mut Simulation, owner: EntityId, other: EntityId) -> SimResult<()> {
        sim.multilink_erase::<M>(owner, other)
    }
}

impl<M: MultilinkAttribute> MultilinkReciprocal for MultilinkSide<M> {}

/// No far side: a one-way reference to an entity of type `B`.
/// Only single links can be one-way.
pub struct NoReciprocal<B>(PhantomData<fn() -> B>);

impl<B: Entity> Reciprocal for NoReciprocal<B> {
    type Owner = B;

    fn connect(_: &mut Simulation, _: EntityId, _: EntityId) -> SimResult<()> {
        Ok(())
    }

    fn disconnect(_: &mut Simulation, _: EntityId, _: EntityId) -> SimResult<()> {
        Ok(())
    }
}

/// Slot usage of multilinks across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultilinkUsage {
    /// Slots allocated by all multilinks.
    pub total_slots: usize,
    /// Largest slot count of a single multilink.
    pub max_slots: usize,
    /// Entity holding that multilink.
    pub max_slots_entity: EntityId,
}

impl Simulation {
    /// Current value of link `L` of `id`, without time synchronisation.
    pub fn link<L: LinkAttribute>(&self, id: EntityId) -> SimResult<Link<L::Target>> {
        Ok(*L::cell(self.entity::<L::Entity>(id)?))
    }

    /// Target of link `L` of `id`, or `None`, without time synchronisation.
    pub fn get_linked<L: LinkAttribute>(&self, id: EntityId) -> SimResult<Option<EntityId>> {
        Ok(self.link::<L>(id)?.get())
    }

    /// Follow link `L` of `id`.
    ///
    /// Under the just-in-time policy the target is first aged to the global
    /// time. Following to a target whose clock is ahead of the global time
    /// is a causality violation unless clairvoyance is allowed. An empty
    /// link yields [`EntityId::NULL`].
    pub fn follow<L: LinkAttribute>(&mut self, id: EntityId) -> SimResult<EntityId> {
        let target = self.link::<L>(id)?.id();
        if !target.is_null() {
            self.sync_for_read(target)?;
        }
        Ok(target)
    }

    /// Read attribute `A` of the entity link `L` of `id` points to. An empty
    /// link reads the null entity, whose attributes are at their defaults.
    pub fn get_through<L, A>(&mut self, id: EntityId) -> SimResult<A::Value>
    where
        L: LinkAttribute,
        A: crate::Attribute<Entity = L::Target>,
    {
        let target = self.follow::<L>(id)?;
        self.get::<A>(target)
    }

    /// Point link `L` of `id` at `target`, keeping the far side consistent.
    pub fn set_link<L: LinkAttribute>(
        &mut self,
        id: EntityId,
        target: Link<L::Target>,
    ) -> SimResult<()> {
        self.check_modification(L::NAME, id)?;
        let old = self.link::<L>(id)?;
        if old == target {
            return Ok(());
        }
        if let Some(t) = target.get() {
            self.check_link_target::<L::Target>(L::NAME, id, t)?;
        }
        L::notify(self, id)?;
        *L::cell_mut(self.entity_mut::<L::Entity>(id)?) = target;

        if let Some(previous) = old.get() {
            L::Reciprocal::disconnect(self, previous, id)?;
        }
        if let Some(next) = target.get() {
            L::Reciprocal::connect(self, next, id)?;
        }
        L::side_effects(self, id, old, target)?;

        trace!(link = L::NAME, entity = %id, old = %old.id(), new = %target.id(), "link changed");
        self.record(TraceKind::LinkChanged {
            entity: id,
            link: L::NAME,
            old: old.id(),
            new: target.id(),
        });
        Ok(())
    }

    /// Add `target` to multilink `M` of `id`. Adding a present target or
    /// the null entity does nothing.
    pub fn multilink_insert<M: MultilinkAttribute>(
        &mut self,
        id: EntityId,
        target: EntityId,
    ) -> SimResult<()> {
        self.check_modification(M::NAME, id)?;
        if target.is_null() {
            return Ok(());
        }
        self.check_link_target::<M::Target>(M::NAME, id, target)?;
        let threshold = self.config().multilink_warning_threshold;
        let (outcome, capacity) = {
            let cell = M::cell_mut(self.entity_mut::<M::Entity>(id)?);
            (cell.slots.insert(target), cell.slots.capacity())
        };
        if !outcome.changed() {
            return Ok(());
        }
        if outcome == SlotInsert::Appended {
            self.note_multilink_growth(id, capacity);
            if capacity > threshold && self.warned_multilinks.insert(TypeId::of::<M>()) {
                warn!(
                    multilink = M::NAME,
                    entity = %id,
                    slots = capacity,
                    "a multilink has grown larger than {threshold}, possible performance impact"
                );
            }
        }
        M::side_effects(self, id)?;
        M::Reciprocal::connect(self, target, id)?;
        self.record(TraceKind::MultilinkChanged {
            entity: id,
            multilink: M::NAME,
            target,
            inserted: true,
        });
        Ok(())
    }

    /// Remove `target` from multilink `M` of `id`.
    pub fn multilink_erase<M: MultilinkAttribute>(
        &mut self,
        id: EntityId,
        target: EntityId,
    ) -> SimResult<()> {
        self.check_modification(M::NAME, id)?;
        let erased = M::cell_mut(self.entity_mut::<M::Entity>(id)?)
            .slots
            .erase(target);
        if !erased {
            return Ok(());
        }
        M::side_effects(self, id)?;
        M::Reciprocal::disconnect(self, target, id)?;
        self.record(TraceKind::MultilinkChanged {
            entity: id,
            multilink: M::NAME,
            target,
            inserted: false,
        });
        Ok(())
    }

    /// Remove every target from multilink `M` of `id`.
    pub fn multilink_clear<M: MultilinkAttribute>(&mut self, id: EntityId) -> SimResult<()> {
        self.check_modification(M::NAME, id)?;
        let removed = M::cell_mut(self.entity_mut::<M::Entity>(id)?)
            .slots
            .take_all();
        if removed.is_empty() {
            return Ok(());
        }
        for target in &removed {
            M::Reciprocal::disconnect(self, *target, id)?;
            self.record(TraceKind::MultilinkChanged {
                entity: id,
                multilink: M::NAME,
                target: *target,
                inserted: false,
            });
        }
        M::side_effects(self, id)
    }

    /// Take every target out of multilink `M` of `id` and exit it from the
    /// simulation.
    pub fn multilink_finish_all<M: MultilinkAttribute>(&mut self, id: EntityId) -> SimResult<()> {
        self.check_modification(M::NAME, id)?;
        let removed = M::cell_mut(self.entity_mut::<M::Entity>(id)?)
            .slots
            .take_all();
        if removed.is_empty() {
            return Ok(());
        }
        for target in removed {
            if self.base(target)?.is_active() {
                self.exit_simulation(target)?;
            }
        }
        M::side_effects(self, id)
    }

    /// Targets of multilink `M` of `id`, in slot order.
    pub fn multilink_targets<M: MultilinkAttribute>(
        &self,
        id: EntityId,
    ) -> SimResult<Vec<EntityId>> {
        Ok(M::cell(self.entity::<M::Entity>(id)?).iter().collect())
    }

    /// Number of targets of multilink `M` of `id`.
    pub fn multilink_len<M: MultilinkAttribute>(&self, id: EntityId) -> SimResult<usize> {
        Ok(M::cell(self.entity::<M::Entity>(id)?).len())
    }

    /// Targets of multilink `M` of `id` as a comma-separated list.
    pub fn multilink_contents<M: MultilinkAttribute>(&self, id: EntityId) -> SimResult<String> {
        Ok(M::cell(self.entity::<M::Entity>(id)?).contents())
    }

    /// Slot usage of all multilinks so far.
    pub fn multilink_usage(&self) -> MultilinkUsage {
        self.multilink_usage
    }

    fn note_multilink_growth(&mut self, id: EntityId, capacity: usize) {
        let usage = &mut self.multilink_usage;
        usage.total_slots += 1;
        if capacity > usage.max_slots {
            usage.max_slots = capacity;
            usage.max_slots_entity = id;
        }
    }

    fn check_link_target<B: Entity>(
        &self,
        link: &'static str,
        owner: EntityId,
        target: EntityId,
    ) -> SimResult<()> {
        let base = self.entity::<B>(target)?.base();
        if base.lifecycle() == Lifecycle::Exited {
            return Err(SimError::LinkToExitedEntity {
                link,
                owner,
                target,
            });
        }
        Ok(())
    }

    /// Bring `target`'s clock to the global time before it is read through
    /// a reference.
    pub(crate) fn sync_for_read(&mut self, target: EntityId) -> SimResult<()> {
        if !self.config().just_in_time() {
            return Ok(());
        }
        let base = self.base(target)?;
        if !base.is_active() {
            return Ok(());
        }
        let entity_time = base.time();
        let now = self.global_time();
        if entity_time < now {
            self.age_to(target, now)
        } else if entity_time > now && !self.config().allow_clairvoyance {
            Err(self.causality(CausalityKind::Clairvoyance, target, entity_time, now))
        } else {
            Ok(())
        }
    }
}
