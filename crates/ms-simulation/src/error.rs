use std::fmt;

use ms_core::{CoreError, EntityId, Time};

use crate::event::EventTypeId;

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Which causality rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalityKind {
    /// An entity was asked to age to a time before its own clock.
    AgedBackward,
    /// A reference was followed to an entity whose clock is ahead of the
    /// global clock.
    Clairvoyance,
    /// The next event is scheduled before the global clock.
    EventInPast,
}

impl fmt::Display for CausalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AgedBackward => "entity aged backward in time",
            Self::Clairvoyance => "reference read an entity in the future",
            Self::EventInPast => "event scheduled in the past",
        };
        f.write_str(text)
    }
}

/// The event being processed when an error was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    /// Event name.
    pub name: &'static str,
    /// Model-wide event type id.
    pub id: EventTypeId,
    /// Entity the event belongs to.
    pub entity: EntityId,
}

impl fmt::Display for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {}) in entity {}", self.name, self.id, self.entity)
    }
}

/// Formats an optional event context for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentEvent(pub Option<EventContext>);

impl fmt::Display for CurrentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(ctx) => write!(f, "{ctx}"),
            None => f.write_str("no event"),
        }
    }
}

/// Scheduler invariants that a correctly built model never breaks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// The head of the queue has a non-finite time.
    #[error("event {0} reached the head of the queue with a non-finite time")]
    NonFiniteEvent(EventContext),

    /// A time function returned NaN.
    #[error("time function of event {0} returned NaN")]
    NanEventTime(EventContext),

    /// An attribute was assigned while dirty events were being cleaned.
    #[error("attribute {attribute} of entity {entity} assigned while cleaning events")]
    AttributeModificationDuringClean {
        /// Attribute name.
        attribute: &'static str,
        /// Entity whose attribute was assigned.
        entity: EntityId,
    },

    /// An operation needs an active entity.
    #[error("entity {0} is not active in the simulation")]
    EntityNotActive(EntityId),

    /// `enter_simulation` was called twice.
    #[error("entity {0} has already entered the simulation")]
    AlreadyEntered(EntityId),

    /// The null entity was written to.
    #[error("attribute {0} of the null entity cannot be modified")]
    NullEntityWrite(&'static str),

    /// The runtime was used before `initialize_runtime`.
    #[error("simulation runtime is not initialized")]
    NotInitialized,
}

/// Errors raised by the simulation runtime. Every variant is fatal for the
/// run that raised it.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A causality rule was broken. Stems from model logic; retrying is
    /// meaningless.
    #[error(
        "causality violation ({violation}): entity {entity} at time {entity_time}, \
         target time {target_time}, while processing {event} [member {member}, seed {seed}]"
    )]
    Causality {
        /// Which rule was broken.
        violation: CausalityKind,
        /// Event being processed, if any.
        event: CurrentEvent,
        /// Entity whose clock was involved.
        entity: EntityId,
        /// That entity's clock.
        entity_time: Time,
        /// The time it was asked to move to or read at.
        target_time: Time,
        /// Replicate id of the run.
        member: u32,
        /// Seed of the run.
        seed: u64,
    },

    /// A scheduler invariant was broken.
    #[error("scheduler invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// An entity type was used that the model does not register.
    #[error("entity type {0} is not registered in the model")]
    UnknownEntityType(&'static str),

    /// An event type was used that its entity type does not declare.
    #[error("event {event} is not declared by entity type {entity_type}")]
    UnknownEvent {
        /// Event name.
        event: &'static str,
        /// Entity type name.
        entity_type: &'static str,
    },

    /// An entity set was used that the model does not declare.
    #[error("entity set {0} is not declared")]
    UnknownEntitySet(&'static str),

    /// An entity type declares two events with the same name.
    #[error("entity type {entity_type} declares event {event} twice")]
    DuplicateEvent {
        /// Entity type name.
        entity_type: &'static str,
        /// Event name.
        event: &'static str,
    },

    /// No live entity has this id.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but is of a different type.
    #[error("entity {id} is a {actual}, expected a {expected}")]
    WrongEntityType {
        /// Entity id.
        id: EntityId,
        /// Requested type name.
        expected: &'static str,
        /// Actual type name.
        actual: &'static str,
    },

    /// A link was pointed at an entity that has left the simulation.
    #[error("link {link} of entity {owner} cannot target exited entity {target}")]
    LinkToExitedEntity {
        /// Link name.
        link: &'static str,
        /// Entity holding the link.
        owner: EntityId,
        /// Exited target.
        target: EntityId,
    },

    /// A core data structure reported an error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SimError {
    /// Returns `true` for causality violations.
    pub fn is_causality(&self) -> bool {
        matches!(self, Self::Causality { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn causality_message_has_full_context() {
        let err = SimError::Causality {
            violation: CausalityKind::AgedBackward,
            event: CurrentEvent(Some(EventContext {
                name: "Birthday",
                id: EventTypeId(2),
                entity: EntityId(4),
            })),
            entity: EntityId(4),
            entity_time: 10.0,
            target_time: 7.5,
            member: 1,
            seed: 99,
        };
        let msg = err.to_string();
        assert!(err.is_causality());
        assert!(msg.contains("aged backward"));
        assert!(msg.contains("Birthday (id 2) in entity 4"));
        assert!(msg.contains("at time 10"));
        assert!(msg.contains("target time 7.5"));
        assert!(msg.contains("member 1, seed 99"));
    }

    #[test]
    fn invariant_converts() {
        let err: SimError = InvariantViolation::EntityNotActive(EntityId(3)).into();
        assert!(matches!(
            err,
            SimError::Invariant(InvariantViolation::EntityNotActive(_))
        ));
        assert!(!err.is_causality());
    }
}
