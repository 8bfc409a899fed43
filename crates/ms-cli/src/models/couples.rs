//! Singles search for a partner among the other singles. Marriage is a
//! reciprocal link; a death makes the surviving spouse single again.

use std::sync::Arc;

use ms_simulation::{
    Assignable, Attribute, DurationAttribute, Entity, EntityBase, EntityDecl, EntityId,
    EntitySetDef, Event, Identity, Link, LinkAttribute, LinkSide, ModelBuilder, ModelSchema,
    SimResult, Simulation, TIME_INFINITE, Time,
};

use super::{ModelInfo, exponential};

pub const INFO: ModelInfo = ModelInfo {
    name: "couples",
    description: "persons marry partners drawn from the set of singles",
    horizon: 100.0,
    build,
    populate,
    describe,
};

const POPULATION: usize = 200;
const MEAN_LIFETIME: f64 = 40.0;
const MEAN_SEARCH: f64 = 5.0;

const LIFETIME_STREAM: u32 = 0;
const PARTNER_STREAM: u32 = 1;
const SEARCH_STREAM: u32 = 2;

struct Person {
    base: EntityBase,
    spouse: Link<Person>,
    married: bool,
    marriages: u32,
    age: Time,
    search_at: Time,
    death_at: Time,
}

impl Entity for Person {
    const KIND: &'static str = "Person";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            spouse: Link::NULL,
            married: false,
            marriages: 0,
            age: 0.0,
            search_at: TIME_INFINITE,
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
        decl.event::<Marriage>()
            .event::<Death>()
            .identity::<Married>()
            .duration::<Age>()
            .link::<Spouse>()
            .entity_set::<Singles>();
    }
}

struct Spouse;

impl LinkAttribute for Spouse {
    type Entity = Person;
    type Target = Person;
    type Reciprocal = LinkSide<Spouse>;
    const NAME: &'static str = "spouse";

    fn cell(p: &Person) -> &Link<Person> {
        &p.spouse
    }

    fn cell_mut(p: &mut Person) -> &mut Link<Person> {
        &mut p.spouse
    }

    fn side_effects(
        sim: &mut Simulation,
        id: EntityId,
        _: Link<Person>,
        _: Link<Person>,
    ) -> SimResult<()> {
        sim.evaluate::<Married>(id)
    }
}

struct Married;

impl Attribute for Married {
    type Entity = Person;
    type Value = bool;
    const NAME: &'static str = "married";

    fn cell(p: &Person) -> &bool {
        &p.married
    }

    fn cell_mut(p: &mut Person) -> &mut bool {
        &mut p.married
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &bool, married: &bool) -> SimResult<()> {
        if *married {
            let count = sim.get::<Marriages>(id)?;
            sim.set::<Marriages>(id, count + 1)?;
        } else {
            let wait = exponential(sim, SEARCH_STREAM, MEAN_SEARCH);
            let now = sim.global_time();
            sim.set::<SearchAt>(id, now + wait)?;
        }
        sim.refresh_set::<Singles>(id)?;
        sim.make_dirty::<Marriage>(id)
    }
}

impl Identity for Married {
    fn expression(sim: &mut Simulation, id: EntityId) -> SimResult<bool> {
        Ok(!sim.link::<Spouse>(id)?.is_null())
    }
}

struct Marriages;

impl Attribute for Marriages {
    type Entity = Person;
    type Value = u32;
    const NAME: &'static str = "marriages";

    fn cell(p: &Person) -> &u32 {
        &p.marriages
    }

    fn cell_mut(p: &mut Person) -> &mut u32 {
        &mut p.marriages
    }
}

impl Assignable for Marriages {}

struct Age;

impl Attribute for Age {
    type Entity = Person;
    type Value = Time;
    const NAME: &'static str = "age";

    fn cell(p: &Person) -> &Time {
        &p.age
    }

    fn cell_mut(p: &mut Person) -> &mut Time {
        &mut p.age
    }
}

impl DurationAttribute for Age {}

struct SearchAt;

impl Attribute for SearchAt {
    type Entity = Person;
    type Value = Time;
    const NAME: &'static str = "search_at";

    fn cell(p: &Person) -> &Time {
        &p.search_at
    }

    fn cell_mut(p: &mut Person) -> &mut Time {
        &mut p.search_at
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &Time, _: &Time) -> SimResult<()> {
        sim.make_dirty::<Marriage>(id)
    }
}

impl Assignable for SearchAt {}

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

/// Unmarried persons in creation order.
struct Singles;

impl EntitySetDef for Singles {
    type Entity = Person;
    type Key = ();
    const NAME: &'static str = "singles";

    fn filter(sim: &mut Simulation, id: EntityId) -> SimResult<bool> {
        Ok(!sim.get::<Married>(id)?)
    }

    fn key(_: &mut Simulation, _: EntityId) -> SimResult<()> {
        Ok(())
    }
}

struct Marriage;

impl Event for Marriage {
    type Entity = Person;
    const NAME: &'static str = "Marriage";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        if sim.get::<Married>(id)? {
            Ok(TIME_INFINITE)
        } else {
            sim.get::<SearchAt>(id)
        }
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let singles = sim.set_size::<Singles>()?;
        if singles < 2 {
            let wait = exponential(sim, SEARCH_STREAM, MEAN_SEARCH);
            let now = sim.global_time();
            return sim.set::<SearchAt>(id, now + wait);
        }
        // Draw among the other singles by skipping over our own position.
        let own = sim.set_rank::<Singles>(id)?;
        let pick = sim.random().index(PARTNER_STREAM, singles - 1);
        let index = if pick + 1 >= own { pick + 1 } else { pick };
        let partner = sim.set_select::<Singles>(index)?;
        sim.set_link::<Spouse>(id, Link::to(partner))
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
    ModelBuilder::new("couples").entity::<Person>().build()
}

fn populate(sim: &mut Simulation) -> SimResult<()> {
    for _ in 0..POPULATION {
        let death_at = exponential(sim, LIFETIME_STREAM, MEAN_LIFETIME);
        let search_at = exponential(sim, SEARCH_STREAM, MEAN_SEARCH);
        sim.spawn::<Person>(|p| {
            p.death_at = death_at;
            p.search_at = search_at;
        })?;
    }
    Ok(())
}

fn describe(sim: &Simulation) -> SimResult<String> {
    let alive = sim.live_entities::<Person>()?;
    let mut married = 0;
    let mut marriages = 0;
    for id in &alive {
        if sim.get::<Married>(*id)? {
            married += 1;
        }
        marriages += sim.get::<Marriages>(*id)?;
    }
    Ok(format!(
        "alive {}, married {married}, singles {}, marriages of survivors {marriages}",
        alive.len(),
        sim.set_size::<Singles>()?
    ))
}

#[cfg(test)]
mod tests {
    use ms_simulation::SimConfig;

    use super::*;

    fn simulation(seed: u64) -> Simulation {
        let mut sim = Simulation::new(build().unwrap(), SimConfig::default().with_seed(seed));
        sim.initialize_runtime().unwrap();
        populate(&mut sim).unwrap();
        sim
    }

    #[test]
    fn spouses_point_at_each_other() {
        let mut sim = simulation(42);
        sim.run_until(30.0).unwrap();
        let mut couples = 0;
        for id in sim.live_entities::<Person>().unwrap() {
            let spouse = sim.link::<Spouse>(id).unwrap().id();
            if !spouse.is_null() {
                couples += 1;
                assert_eq!(sim.link::<Spouse>(spouse).unwrap().id(), id);
                assert!(!sim.set_contains::<Singles>(id).unwrap());
            } else {
                assert!(sim.set_contains::<Singles>(id).unwrap());
            }
        }
        assert!(couples > 0);
    }

    #[test]
    fn survivors_become_single_again() {
        let mut sim = simulation(7);
        sim.run_until(100.0).unwrap();
        for id in sim.live_entities::<Person>().unwrap() {
            let married = sim.get::<Married>(id).unwrap();
            let spouse = sim.link::<Spouse>(id).unwrap();
            assert_eq!(married, !spouse.is_null());
            if !married {
                assert!(sim.get::<SearchAt>(id).unwrap() >= sim.entity_time(id).unwrap());
            }
        }
    }
}
