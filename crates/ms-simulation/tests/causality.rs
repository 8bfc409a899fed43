//! Integration tests: causality.
use ms_simulation::{
    Assignable, Attribute, CausalityKind, DurationAttribute, Entity, EntityBase, EntityDecl,
    EntityId, Event, InvariantViolation, Link, LinkAttribute, ModelBuilder, NoReciprocal,
    SimConfig, SimError, SimResult, Simulation, TIME_INFINITE, Time, TimePolicy,
};

struct Walker {
    base: EntityBase,
    due: Time,
    rewind: bool,
    seen: u32,
    age: Time,
    peer: Link<Walker>,
}

impl Entity for Walker {
    const KIND: &'static str = "Walker";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            due: TIME_INFINITE,
            rewind: false,
            seen: 0,
            age: 0.0,
            peer: Link::NULL,
        }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.event::<Step>().duration::<Age>().link::<Peer>();
    }
}

struct Due;

impl Attribute for Due {
    type Entity = Walker;
    type Value = Time;
    const NAME: &'static str = "due";

    fn cell(w: &Walker) -> &Time {
        &w.due
    }

    fn cell_mut(w: &mut Walker) -> &mut Time {
        &mut w.due
    }

    fn side_effects(sim: &mut Simulation, id: EntityId, _: &Time, _: &Time) -> SimResult<()> {
        sim.make_dirty::<Step>(id)
    }
}

impl Assignable for Due {}

struct Seen;

impl Attribute for Seen {
    type Entity = Walker;
    type Value = u32;
    const NAME: &'static str = "seen";

    fn cell(w: &Walker) -> &u32 {
        &w.seen
    }

    fn cell_mut(w: &mut Walker) -> &mut u32 {
        &mut w.seen
    }
}

impl Assignable for Seen {}

struct Age;

impl Attribute for Age {
    type Entity = Walker;
    type Value = Time;
    const NAME: &'static str = "age";

    fn cell(w: &Walker) -> &Time {
        &w.age
    }

    fn cell_mut(w: &mut Walker) -> &mut Time {
        &mut w.age
    }
}

impl DurationAttribute for Age {}

struct Peer;

impl LinkAttribute for Peer {
    type Entity = Walker;
    type Target = Walker;
    type Reciprocal = NoReciprocal<Walker>;
    const NAME: &'static str = "peer";

    fn cell(w: &Walker) -> &Link<Walker> {
        &w.peer
    }

    fn cell_mut(w: &mut Walker) -> &mut Link<Walker> {
        &mut w.peer
    }
}

/// Looks at the peer, then either stops or reschedules one unit earlier.
struct Step;

impl Event for Step {
    type Entity = Walker;
    const NAME: &'static str = "Step";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        sim.get::<Due>(id)
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let peer_age = sim.get_through::<Peer, Age>(id)?;
        sim.set::<Seen>(id, peer_age as u32)?;
        let next = if sim.entity::<Walker>(id)?.rewind {
            sim.get::<Due>(id)? - 1.0
        } else {
            TIME_INFINITE
        };
        sim.set::<Due>(id, next)
    }
}

/// Writes an attribute from its time function.
struct Meddler {
    base: EntityBase,
    noise: u32,
}

impl Entity for Meddler {
    const KIND: &'static str = "Meddler";

    fn new(base: EntityBase) -> Self {
        Self { base, noise: 0 }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.event::<Meddle>();
    }
}

struct Noise;

impl Attribute for Noise {
    type Entity = Meddler;
    type Value = u32;
    const NAME: &'static str = "noise";

    fn cell(m: &Meddler) -> &u32 {
        &m.noise
    }

    fn cell_mut(m: &mut Meddler) -> &mut u32 {
        &mut m.noise
    }
}

impl Assignable for Noise {}

struct Meddle;

impl Event for Meddle {
    type Entity = Meddler;
    const NAME: &'static str = "Meddle";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        sim.set::<Noise>(id, 1)?;
        Ok(TIME_INFINITE)
    }

    fn implement(_: &mut Simulation, _: EntityId) -> SimResult<()> {
        Ok(())
    }
}

fn simulation(config: SimConfig) -> Simulation {
    let schema = ModelBuilder::new("walkers")
        .entity::<Walker>()
        .entity::<Meddler>()
        .build()
        .unwrap();
    let mut sim = Simulation::new(schema, config);
    sim.initialize_runtime().unwrap();
    sim
}

fn walker(sim: &mut Simulation, due: Time, rewind: bool) -> EntityId {
    sim.spawn::<Walker>(|w| {
        w.due = due;
        w.rewind = rewind;
    })
    .unwrap()
}

#[test]
fn eager_event_in_the_past_is_fatal() {
    let mut sim = simulation(SimConfig::default());
    let id = walker(&mut sim, 2.0, true);
    assert!(sim.do_next_event().unwrap());

    let err = sim.do_next_event().unwrap_err();
    match &err {
        SimError::Causality {
            violation,
            entity,
            entity_time,
            target_time,
            ..
        } => {
            assert_eq!(*violation, CausalityKind::EventInPast);
            assert_eq!(*entity, id);
            assert_eq!(*entity_time, 2.0);
            assert_eq!(*target_time, 1.0);
        }
        other => panic!("expected a causality error, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("event scheduled in the past"));
    assert!(message.contains("Step (id 1) in entity 1"));
    assert!(message.contains("member 0, seed 42"));
}

#[test]
fn time_travel_lets_the_clock_run_backward() {
    let mut sim = simulation(SimConfig::default().with_time_travel(true));
    let id = walker(&mut sim, 2.0, true);
    sim.do_next_event().unwrap();
    sim.do_next_event().unwrap();
    assert_eq!(sim.global_time(), 1.0);
    assert_eq!(sim.entity_time(id).unwrap(), 1.0);
    assert_eq!(sim.get::<Age>(id).unwrap(), 1.0);
}

#[test]
fn eager_policy_ages_everyone() {
    let mut sim = simulation(SimConfig::default());
    let a = walker(&mut sim, 2.0, false);
    let b = walker(&mut sim, 10.0, false);
    sim.do_next_event().unwrap();
    assert_eq!(sim.entity_time(b).unwrap(), 2.0);
    assert_eq!(sim.get::<Age>(a).unwrap(), 2.0);
    assert_eq!(sim.get::<Age>(b).unwrap(), 2.0);
}

#[test]
fn just_in_time_ages_only_the_owner() {
    let mut sim = simulation(SimConfig::default().with_time_policy(TimePolicy::JustInTime));
    let a = walker(&mut sim, 2.0, false);
    let b = walker(&mut sim, 10.0, false);
    sim.do_next_event().unwrap();
    assert_eq!(sim.entity_time(a).unwrap(), 2.0);
    assert_eq!(sim.entity_time(b).unwrap(), 0.0);
    assert_eq!(sim.get::<Age>(b).unwrap(), 0.0);

    sim.do_next_event().unwrap();
    assert_eq!(sim.entity_time(b).unwrap(), 10.0);
    assert_eq!(sim.get::<Age>(b).unwrap(), 10.0);
    assert_eq!(sim.entity_time(a).unwrap(), 2.0);
}

#[test]
fn following_a_link_brings_the_target_up_to_date() {
    let mut sim = simulation(SimConfig::default().with_time_policy(TimePolicy::JustInTime));
    let a = walker(&mut sim, 3.0, false);
    let b = walker(&mut sim, TIME_INFINITE, false);
    sim.set_link::<Peer>(a, Link::to(b)).unwrap();

    sim.do_next_event().unwrap();
    assert_eq!(sim.entity_time(b).unwrap(), 3.0);
    assert_eq!(sim.get::<Seen>(a).unwrap(), 3);
}

#[test]
fn reading_the_future_is_clairvoyance() {
    let setup = |config: SimConfig| {
        let mut sim = simulation(config);
        let a = walker(&mut sim, 2.0, false);
        let b = sim.create::<Walker>().unwrap();
        sim.initialize_entity_time(b, 10.0).unwrap();
        sim.enter_simulation(b).unwrap();
        sim.set_link::<Peer>(a, Link::to(b)).unwrap();
        (sim, b)
    };

    let (mut strict, b) = setup(SimConfig::default().with_time_policy(TimePolicy::JustInTime));
    let err = strict.do_next_event().unwrap_err();
    assert!(matches!(
        err,
        SimError::Causality {
            violation: CausalityKind::Clairvoyance,
            entity,
            ..
        } if entity == b
    ));

    let (mut relaxed, b) = setup(
        SimConfig::default()
            .with_time_policy(TimePolicy::JustInTime)
            .with_clairvoyance(true),
    );
    relaxed.do_next_event().unwrap();
    assert_eq!(relaxed.entity_time(b).unwrap(), 10.0);
}

#[test]
fn time_functions_must_not_assign() {
    let mut sim = simulation(SimConfig::default());
    sim.spawn::<Meddler>(|_| {}).unwrap();
    assert!(matches!(
        sim.time_next_event(),
        Err(SimError::Invariant(
            InvariantViolation::AttributeModificationDuringClean {
                attribute: "noise",
                ..
            }
        ))
    ));

    let mut lax = simulation(SimConfig::default().with_verify_attribute_modification(false));
    let id = lax.spawn::<Meddler>(|_| {}).unwrap();
    assert_eq!(lax.time_next_event().unwrap(), TIME_INFINITE);
    assert_eq!(lax.get::<Noise>(id).unwrap(), 1);
}

#[test]
fn durations_advance_during_clean() {
    let mut sim = simulation(SimConfig::default());
    let a = walker(&mut sim, 4.0, false);
    sim.run_until(TIME_INFINITE).unwrap();
    assert_eq!(sim.get::<Age>(a).unwrap(), 4.0);
    sim.age_to(a, 6.0).unwrap();
    assert_eq!(sim.get::<Age>(a).unwrap(), 6.0);
}
