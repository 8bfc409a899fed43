//! Persons live in households and now and then move to the smallest one.
//! Households take a census of their size every ten time units.

use std::sync::Arc;

use ms_simulation::{
    Assignable, Attribute, DurationAttribute, Entity, EntityBase, EntityDecl, EntityId,
    EntitySetDef, Event, Identity, Link, LinkAttribute, LinkSide, ModelBuilder, ModelSchema,
    Multilink, MultilinkAttribute, MultilinkSide, PRIORITY_SELF_SCHEDULING, SimResult,
    Simulation, TIME_INFINITE, Time,
};

use super::{ModelInfo, exponential};

pub const INFO: ModelInfo = ModelInfo {
    name: "households",
    description: "persons move between households, which keep a periodic census",
    horizon: 100.0,
    build,
    populate,
    describe,
};

const HOUSEHOLDS: usize = 20;
const PERSONS: usize = 100;
const CENSUS_INTERVAL: Time = 10.0;
const MEAN_LIFETIME: f64 = 60.0;
const MEAN_STAY: f64 = 8.0;

const LIFETIME_STREAM: u32 = 0;
const MOVE_STREAM: u32 = 1;
const PLACEMENT_STREAM: u32 = 3;

struct Household {
    base: EntityBase,
    members: Multilink<Person>,
    size: usize,
    peak: usize,
    census_at: Time,
}

impl Entity for Household {
    const KIND: &'static str = "Household";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            members: Multilink::new(),
            size: 0,
            peak: 0,
            census_at: CENSUS_INTERVAL,
        }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.event::<Census>()
            .identity::<Size>()
            .multilink::<Members>()
            .entity_set::<BySize>();
    }
}

struct Person {
    base: EntityBase,
    household: Link<Household>,
    tenure: Time,
    move_at: Time,
    death_at: Time,
}

impl Entity for Person {
    const KIND: &'static str = "Person";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            household: Link::NULL,
            tenure: 0.0,
            move_at: TIME_INFINITE,
            death_at: TIME_INFINITE,
        }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.event::<Move>()
            .event::<Death>()
            .duration::<Tenure>()
            .link::<HouseholdOf>();
    }
}

struct Members;

impl MultilinkAttribute for Members {
    type Entity = Household;
    type Target = Person;
    type Reciprocal = LinkSide<HouseholdOf>;
    const NAME: &'static str = "members";

    fn cell(h: &Household) -> &Multilink<Person> {
        &h.members
    }

    fn cell_mut(h: &mut Household) -> &mut Multilink<Person> {
        &mut h.members
    }

    fn side_effects(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        sim.evaluate::<Size>(id)
    }
}

struct Size;

impl Attribute for Size {
    type Entity = Household;
    type Value = usize;
    const NAME: &'static str = "size";

    fn cell(h: &Household) -> &usize {
        &h.size
    }

    fn cell_mut(h: &mut Household) -> &mut usize {
        &mut h.size
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &usize, _: &usize) -> SimResult<()> {
        sim.refresh_set::<BySize>(id)
    }
}

impl Identity for Size {
    fn expression(sim: &mut Simulation, id: EntityId) -> SimResult<usize> {
        sim.multilink_len::<Members>(id)
    }
}

struct Peak;

impl Attribute for Peak {
    type Entity = Household;
    type Value = usize;
    const NAME: &'static str = "peak";

    fn cell(h: &Household) -> &usize {
        &h.peak
    }

    fn cell_mut(h: &mut Household) -> &mut usize {
        &mut h.peak
    }
}

impl Assignable for Peak {}

struct CensusAt;

impl Attribute for CensusAt {
    type Entity = Household;
    type Value = Time;
    const NAME: &'static str = "census_at";

    fn cell(h: &Household) -> &Time {
        &h.census_at
    }

    fn cell_mut(h: &mut Household) -> &mut Time {
        &mut h.census_at
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &Time, _: &Time) -> SimResult<()> {
        sim.make_dirty::<Census>(id)
    }
}

impl Assignable for CensusAt {}

/// Households ordered by size, smallest first.
struct BySize;

impl EntitySetDef for BySize {
    type Entity = Household;
    type Key = usize;
    const NAME: &'static str = "households_by_size";

    fn key(sim: &mut Simulation, id: EntityId) -> SimResult<usize> {
        sim.get::<Size>(id)
    }
}

struct Census;

impl Event for Census {
    type Entity = Household;
    const NAME: &'static str = "Census";
    const PRIORITY: i32 = PRIORITY_SELF_SCHEDULING;

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        sim.get::<CensusAt>(id)
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let size = sim.get::<Size>(id)?;
        if size > sim.get::<Peak>(id)? {
            sim.set::<Peak>(id, size)?;
        }
        let next = sim.get::<CensusAt>(id)? + CENSUS_INTERVAL;
        sim.set::<CensusAt>(id, next)
    }
}

struct HouseholdOf;

impl LinkAttribute for HouseholdOf {
    type Entity = Person;
    type Target = Household;
    type Reciprocal = MultilinkSide<Members>;
    const NAME: &'static str = "household";

    fn cell(p: &Person) -> &Link<Household> {
        &p.household
    }

    fn cell_mut(p: &mut Person) -> &mut Link<Household> {
        &mut p.household
    }

    fn side_effects(
        sim: &mut Simulation,
        id: EntityId,
        _: Link<Household>,
        _: Link<Household>,
    ) -> SimResult<()> {
        sim.reset_duration::<Tenure>(id)
    }
}

/// Time spent in the current household.
struct Tenure;

impl Attribute for Tenure {
    type Entity = Person;
    type Value = Time;
    const NAME: &'static str = "tenure";

    fn cell(p: &Person) -> &Time {
        &p.tenure
    }

    fn cell_mut(p: &mut Person) -> &mut Time {
        &mut p.tenure
    }
}

impl DurationAttribute for Tenure {
    fn condition(sim: &mut Simulation, id: EntityId) -> SimResult<bool> {
        Ok(!sim.link::<HouseholdOf>(id)?.is_null())
    }
}

struct MoveAt;

impl Attribute for MoveAt {
    type Entity = Person;
    type Value = Time;
    const NAME: &'static str = "move_at";

    fn cell(p: &Person) -> &Time {
        &p.move_at
    }

    fn cell_mut(p: &mut Person) -> &mut Time {
        &mut p.move_at
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &Time, _: &Time) -> SimResult<()> {
        sim.make_dirty::<Move>(id)
    }
}

impl Assignable for MoveAt {}

struct DeathAt;

impl Attribute for DeathAt {
    type Entity = Person;
    type Value = Time;
    const NAME: &'static str = "death_at";

    fn cell(p: &Person) -> &Time {
        &p.death_at
    }

    fn cell_mut(p: &mut Person) -> &mut Time {
        &mut p.death_at
    }
}

struct Move;

impl Event for Move {
    type Entity = Person;
    const NAME: &'static str = "Move";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        sim.get::<MoveAt>(id)
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let smallest = sim.set_at::<BySize>(1)?;
        let current = sim.link::<HouseholdOf>(id)?.id();
        // Only move when it leaves both households no larger than before.
        if !smallest.is_null()
            && smallest != current
            && (current.is_null() || sim.get::<Size>(smallest)? + 1 < sim.get::<Size>(current)?)
        {
            sim.set_link::<HouseholdOf>(id, Link::to(smallest))?;
        }
        let next = sim.global_time() + exponential(sim, MOVE_STREAM, MEAN_STAY);
        sim.set::<MoveAt>(id, next)
    }
}

struct Death;

impl Event for Death {
    type Entity = Person;
    const NAME: &'static str = "Death";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        sim.get::<DeathAt>(id)
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        sim.exit_simulation(id)
    }
}

fn build() -> SimResult<Arc<ModelSchema>> {
    ModelBuilder::new("households")
        .entity::<Household>()
        .entity::<Person>()
        .build()
}

fn populate(sim: &mut Simulation) -> SimResult<()> {
    let mut homes = Vec::with_capacity(HOUSEHOLDS);
    for _ in 0..HOUSEHOLDS {
        homes.push(sim.spawn::<Household>(|_| {})?);
    }
    for _ in 0..PERSONS {
        let death_at = exponential(sim, LIFETIME_STREAM, MEAN_LIFETIME);
        let move_at = exponential(sim, MOVE_STREAM, MEAN_STAY);
        let home = homes[sim.random().index(PLACEMENT_STREAM, homes.len())];
        let person = sim.spawn::<Person>(|p| {
            p.death_at = death_at;
            p.move_at = move_at;
        })?;
        sim.set_link::<HouseholdOf>(person, Link::to(home))?;
    }
    Ok(())
}

fn describe(sim: &Simulation) -> SimResult<String> {
    let homes = sim.set_size::<BySize>()?;
    let smallest = sim.get::<Size>(sim.set_at::<BySize>(1)?)?;
    let largest = sim.get::<Size>(sim.set_at::<BySize>(homes)?)?;
    let mut peak = 0;
    for id in sim.live_entities::<Household>()? {
        peak = peak.max(sim.get::<Peak>(id)?);
    }
    let persons = sim.live_entities::<Person>()?;
    let mut tenure = 0.0;
    for id in &persons {
        tenure += sim.get::<Tenure>(*id)?;
    }
    let mean = if persons.is_empty() {
        0.0
    } else {
        tenure / persons.len() as f64
    };
    Ok(format!(
        "households {homes}, sizes {smallest}..={largest}, peak {peak}, mean tenure {mean:.2}"
    ))
}
