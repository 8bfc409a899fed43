#![allow(dead_code)]

//! A small town: people with spouses, mentors and incomes, living in
//! households.

use ms_simulation::{
    Attribute, Assignable, Entity, EntityBase, EntityDecl, EntityId, EntitySetDef, Identity,
    Link, LinkAttribute, LinkSide, ModelBuilder, Multilink, MultilinkAttribute, MultilinkSide,
    NoReciprocal, SimConfig, SimResult, Simulation,
};
use ordered_float::OrderedFloat;

pub struct Person {
    base: EntityBase,
    income: f64,
    spouse: Link<Person>,
    household: Link<Household>,
    mentor: Link<Person>,
}

impl Entity for Person {
    const KIND: &'static str = "Person";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            income: 0.0,
            spouse: Link::NULL,
            household: Link::NULL,
            mentor: Link::NULL,
        }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.link::<Spouse>()
            .link::<HouseholdOf>()
            .link::<Mentor>()
            .entity_set::<ByIncome>();
    }
}

pub struct Household {
    base: EntityBase,
    members: Multilink<Person>,
    size: usize,
}

impl Entity for Household {
    const KIND: &'static str = "Household";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            members: Multilink::new(),
            size: 0,
        }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.multilink::<Members>().identity::<Size>();
    }
}

pub struct Income;

impl Attribute for Income {
    type Entity = Person;
    type Value = f64;
    const NAME: &'static str = "income";

    fn cell(p: &Person) -> &f64 {
        &p.income
    }

    fn cell_mut(p: &mut Person) -> &mut f64 {
        &mut p.income
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &f64, _: &f64) -> SimResult<()> {
        sim.refresh_set::<ByIncome>(id)
    }
}

impl Assignable for Income {}

pub struct Spouse;

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
}

pub struct HouseholdOf;

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
}

pub struct Mentor;

impl LinkAttribute for Mentor {
    type Entity = Person;
    type Target = Person;
    type Reciprocal = NoReciprocal<Person>;
    const NAME: &'static str = "mentor";

    fn cell(p: &Person) -> &Link<Person> {
        &p.mentor
    }

    fn cell_mut(p: &mut Person) -> &mut Link<Person> {
        &mut p.mentor
    }
}

pub struct Members;

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

pub struct Size;

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
}

impl Identity for Size {
    fn expression(sim: &mut Simulation, id: EntityId) -> SimResult<usize> {
        sim.multilink_len::<Members>(id)
    }
}

/// People with a positive income, poorest first.
pub struct ByIncome;

impl EntitySetDef for ByIncome {
    type Entity = Person;
    type Key = OrderedFloat<f64>;
    const NAME: &'static str = "by_income";

    fn filter(sim: &mut Simulation, id: EntityId) -> SimResult<bool> {
        Ok(sim.get::<Income>(id)? > 0.0)
    }

    fn key(sim: &mut Simulation, id: EntityId) -> SimResult<OrderedFloat<f64>> {
        Ok(OrderedFloat(sim.get::<Income>(id)?))
    }
}

pub fn town(config: SimConfig) -> Simulation {
    let schema = ModelBuilder::new("town")
        .entity::<Person>()
        .entity::<Household>()
        .build()
        .unwrap();
    let mut sim = Simulation::new(schema, config);
    sim.initialize_runtime().unwrap();
    sim
}

pub fn person(sim: &mut Simulation, income: f64) -> EntityId {
    sim.spawn::<Person>(|p| p.income = income).unwrap()
}

pub fn household(sim: &mut Simulation) -> EntityId {
    sim.spawn::<Household>(|_| {}).unwrap()
}
