//! Discrete-event microsimulation runtime.
//!
//! A model is a set of entity types. Each entity carries attributes, links
//! to other entities and events. An event has a time function, which says
//! when it should next fire given the entity's current state, and an
//! implement function, which changes that state. Whenever an attribute
//! changes, the events that depend on it are marked dirty; before the next
//! event fires, every dirty event is recomputed and requeued. Entity sets
//! follow their members the same way.
//!
//! The [`Simulation`] context owns all run state. Models describe their
//! entity types through the [`Entity`], [`Attribute`], [`Event`],
//! [`LinkAttribute`], [`MultilinkAttribute`] and [`EntitySetDef`] traits and
//! register them with a [`ModelBuilder`].

/// Attribute traits and the assignment protocol.
pub mod attribute;
/// Global clock, event counter and checksum.
pub mod clock;
/// Run configuration.
pub mod config;
/// Entity trait, runtime bookkeeping and per-type storage.
pub mod entity;
/// Entity sets maintained over entity attributes.
pub mod entity_set;
/// Error types used throughout the crate.
pub mod error;
/// Event trait, queue keys and scheduling state.
pub mod event;
/// Links, multilinks and reciprocal maintenance.
pub mod link;
/// Model registration and the immutable schema.
pub mod model;
/// Seeded random streams.
pub mod random;
/// The simulation context and scheduler.
pub mod simulation;
/// Observational trace log.
pub mod trace;

/// Re-export attribute traits.
pub use attribute::{Assignable, Attribute, DurationAttribute, Identity};
/// Re-export the clock.
pub use clock::SimClock;
/// Re-export configuration types.
pub use config::{SimConfig, TimePolicy};
/// Re-export entity types.
pub use entity::{Entity, EntityBase, Lifecycle, Population};
/// Re-export the entity set definition trait.
pub use entity_set::EntitySetDef;
/// Re-export error types.
pub use error::{
    CausalityKind, CurrentEvent, EventContext, InvariantViolation, SimError, SimResult,
};
/// Re-export event types.
pub use event::{
    DirtyKey, Event, EventHandle, EventState, EventTypeId, PRIORITY_SELF_SCHEDULING, QueueKey,
};
/// Re-export link types.
pub use link::{
    Link, LinkAttribute, LinkSide, Multilink, MultilinkAttribute, MultilinkReciprocal,
    MultilinkSide, MultilinkUsage, NoReciprocal, Reciprocal,
};
/// Re-export model registration types.
pub use model::{EntityDecl, ModelBuilder, ModelSchema};
/// Re-export random streams.
pub use random::RandomStreams;
/// Re-export the simulation context.
pub use simulation::{RunSummary, Simulation};
/// Re-export trace types.
pub use trace::{TraceKind, TraceLog, TraceRecord};

/// Re-export of the core crate's types used in model code.
pub use ms_core::{EntityId, ModelStatus, RunStateHandle, TIME_INFINITE, Time};
