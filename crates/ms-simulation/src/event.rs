use std::cmp::Reverse;
use std::fmt;

use ms_core::{EntityId, TIME_INFINITE, Time};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::SimResult;
use crate::simulation::Simulation;

/// Priority reserved for self-scheduling housekeeping events. Events with
/// this priority fire before any other event at the same time and are left
/// out of the event checksum.
pub const PRIORITY_SELF_SCHEDULING: i32 = i32::MAX;

/// Model-wide id of an event type.
///
/// Assigned when the model is built, as the position of the event's name in
/// the sorted list of all event names. Two entity types declaring an event
/// with the same name share its id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EventTypeId(pub u32);

impl fmt::Display for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event type declared by an entity type.
///
/// Implementors are zero-sized markers. Each active entity carries one
/// instance of every event its type declares. The runtime calls [`time`]
/// lazily after the instance has been made dirty and fires [`implement`]
/// when the instance reaches the head of the queue.
///
/// [`time`]: Event::time
/// [`implement`]: Event::implement
pub trait Event: 'static {
    /// Entity type the event belongs to.
    type Entity: Entity;

    /// Event name, used for id assignment and diagnostics.
    const NAME: &'static str;

    /// Higher priority fires first among events at the same time.
    const PRIORITY: i32 = 0;

    /// Ordinal from a legacy model, used in the event checksum when present.
    const LEGACY_NUMBER: Option<u32> = None;

    /// When the event occurs next. [`TIME_INFINITE`] means never.
    ///
    /// Must not assign attributes. Following links is allowed.
    fn time(sim: &mut Simulation, id: EntityId) -> SimResult<Time>;

    /// What happens when the event fires.
    fn implement(sim: &mut Simulation, id: EntityId) -> SimResult<()>;

    /// Time function with a memory cell carried between evaluations.
    fn time_with_memory(sim: &mut Simulation, id: EntityId, memory: i32) -> SimResult<(Time, i32)> {
        Ok((Self::time(sim, id)?, memory))
    }

    /// Implement function receiving the memory left by the last time
    /// evaluation.
    fn implement_with_memory(sim: &mut Simulation, id: EntityId, memory: i32) -> SimResult<()> {
        let _ = memory;
        Self::implement(sim, id)
    }
}

/// Scheduling state of one event instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventState {
    /// Last computed occurrence time.
    pub time: Time,
    /// Memory cell of memory events.
    pub memory: i32,
    /// The instance is in the queue.
    pub in_queue: bool,
    /// The time must be recomputed before use.
    pub dirty: bool,
    /// The instance is pending removal.
    pub zombie: bool,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            time: TIME_INFINITE,
            memory: 0,
            in_queue: false,
            dirty: false,
            zombie: false,
        }
    }
}

impl EventState {
    /// Reset to "never occurs, not tracked".
    pub fn initialize(&mut self) {
        *self = Self::default();
    }
}

/// Position of a clean event in the queue.
///
/// Orders by time ascending, priority descending, event type id ascending
/// and owning entity id ascending. An entity holds at most one instance of
/// each event type, so two instances never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueKey {
    time: OrderedFloat<Time>,
    priority: Reverse<i32>,
    event: EventTypeId,
    entity: EntityId,
}

impl QueueKey {
    /// Key of an instance scheduled at `time`.
    pub fn new(time: Time, priority: i32, event: EventTypeId, entity: EntityId) -> Self {
        Self {
            time: OrderedFloat(time),
            priority: Reverse(priority),
            event,
            entity,
        }
    }

    /// Scheduled time.
    pub fn time(&self) -> Time {
        self.time.0
    }

    /// Priority.
    pub fn priority(&self) -> i32 {
        self.priority.0
    }

    /// Event type id.
    pub fn event(&self) -> EventTypeId {
        self.event
    }

    /// Owning entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

/// Position of a dirty event in the dirty set: priority descending, event
/// type id ascending, entity id ascending. Time is stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirtyKey {
    priority: Reverse<i32>,
    event: EventTypeId,
    entity: EntityId,
}

impl DirtyKey {
    /// Key of a dirty instance.
    pub fn new(priority: i32, event: EventTypeId, entity: EntityId) -> Self {
        Self {
            priority: Reverse(priority),
            event,
            entity,
        }
    }

    /// Event type id.
    pub fn event(&self) -> EventTypeId {
        self.event
    }

    /// Owning entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

/// Description of a queued event instance, as returned by
/// [`Simulation::peek_next_event`].
#[derive(Debug, Clone, PartialEq)]
pub struct EventHandle {
    /// Event name.
    pub name: &'static str,
    /// Event type id.
    pub id: EventTypeId,
    /// Owning entity.
    pub entity: EntityId,
    /// Scheduled time.
    pub time: Time,
    /// Priority.
    pub priority: i32,
}
