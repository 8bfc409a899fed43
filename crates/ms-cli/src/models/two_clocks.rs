//! One entity with two one-shot events: `Y` three time units after entry
//! and `X` five after.

use std::sync::Arc;

use ms_simulation::{
    Assignable, Attribute, Entity, EntityBase, EntityDecl, EntityId, Event, ModelBuilder,
    ModelSchema, SimResult, Simulation, TIME_INFINITE, Time,
};

use super::ModelInfo;

pub const INFO: ModelInfo = ModelInfo {
    name: "two-clocks",
    description: "one entity, events X at +5 and Y at +3, each firing once",
    horizon: 10.0,
    build,
    populate,
    describe,
};

struct Clock {
    base: EntityBase,
    x_done: bool,
    y_done: bool,
}

impl Entity for Clock {
    const KIND: &'static str = "Clock";

    fn new(base: EntityBase) -> Self {
        Self {
            base,
            x_done: false,
            y_done: false,
        }
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn declare(decl: &mut EntityDecl<Self>) {
        decl.event::<X>().event::<Y>();
    }
}

struct XDone;

impl Attribute for XDone {
    type Entity = Clock;
    type Value = bool;
    const NAME: &'static str = "x_done";

    fn cell(c: &Clock) -> &bool {
        &c.x_done
    }

    fn cell_mut(c: &mut Clock) -> &mut bool {
        &mut c.x_done
    }
}

impl Assignable for XDone {}

struct YDone;

impl Attribute for YDone {
    type Entity = Clock;
    type Value = bool;
    const NAME: &'static str = "y_done";

    fn cell(c: &Clock) -> &bool {
        &c.y_done
    }

    fn cell_mut(c: &mut Clock) -> &mut bool {
        &mut c.y_done
    }
}

impl Assignable for YDone {}

struct X;

impl Event for X {
    type Entity = Clock;
    const NAME: &'static str = "X";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        if sim.get::<XDone>(id)? {
            Ok(TIME_INFINITE)
        } else {
            Ok(5.0)
        }
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        sim.set::<XDone>(id, true)
    }
}

struct Y;

impl Event for Y {
    type Entity = Clock;
    const NAME: &'static str = "Y";

    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time> {
        if sim.get::<YDone>(id)? {
            Ok(TIME_INFINITE)
        } else {
            Ok(3.0)
        }
    }

    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        sim.set::<YDone>(id, true)
    }
}

fn build() -> SimResult<Arc<ModelSchema>> {
    ModelBuilder::new("two-clocks").entity::<Clock>().build()
}

fn populate(sim: &mut Simulation) -> SimResult<()> {
    sim.spawn::<Clock>(|_| {})?;
    Ok(())
}

fn describe(sim: &Simulation) -> SimResult<String> {
    let mut fired = Vec::new();
    for id in sim.live_entities::<Clock>()? {
        if sim.get::<YDone>(id)? {
            fired.push("Y");
        }
        if sim.get::<XDone>(id)? {
            fired.push("X");
        }
    }
    Ok(format!("fired: {}", fired.join(",")))
}
