//! The attribute protocol.
//!
//! An attribute is a zero-sized marker type naming one value cell of an
//! entity. All writes go through [`Simulation`], which runs the protocol:
//!
//! 1. read the old value;
//! 2. stop if the new value is equal;
//! 3. run [`Attribute::notify`] while the old value is still stored;
//! 4. store the new value;
//! 5. run [`Attribute::side_effects`] with old and new value.
//!
//! Side effects are where a model wires dependents: re-evaluating identity
//! attributes, marking events dirty and refreshing entity sets. They run in
//! the order the model writes them.

use std::fmt;

use ms_core::{EntityId, Time};
use tracing::trace;

use crate::entity::Entity;
use crate::error::{InvariantViolation, SimResult};
use crate::simulation::Simulation;

/// A named value cell of an entity.
pub trait Attribute: 'static {
    /// Entity type holding the cell.
    type Entity: Entity;

    /// Stored value type. Equality decides whether a write is a change.
    type Value: Clone + PartialEq + fmt::Debug + 'static;

    /// Attribute name for diagnostics.
    const NAME: &'static str;

    /// The cell inside an entity.
    fn cell(entity: &Self::Entity) -> &Self::Value;

    /// The cell inside an entity, mutably.
    fn cell_mut(entity: &mut Self::Entity) -> &mut Self::Value;

    /// Runs before a change, while the old value is still stored.
    fn notify(sim: &mut Simulation, id: EntityId) -> SimResult<()> {
        let _ = (sim, id);
        Ok(())
    }

    /// Runs after a change.
    fn side_effects(
        sim: &mut Simulation,
        id: EntityId,
        old: &Self::Value,
        new: &Self::Value,
    ) -> SimResult<()> {
        let _ = (sim, id, old, new);
        Ok(())
    }
}

/// An attribute model logic may assign with [`Simulation::set`].
pub trait Assignable: Attribute {}

/// An attribute whose value is always its expression over other
/// attributes.
///
/// Identities are re-evaluated eagerly: every attribute the expression
/// reads calls [`Simulation::evaluate`] for it from its side effects.
pub trait Identity: Attribute {
    /// Compute the value.
    fn expression(sim: &mut Simulation, id: EntityId) -> SimResult<Self::Value>;
}

/// Time accumulated while a condition holds. Advanced when the entity ages.
pub trait DurationAttribute: Attribute<Value = Time> {
    /// Whether time currently accumulates.
    fn condition(sim: &mut Simulation, id: EntityId) -> SimResult<bool> {
        let _ = (sim, id);
        Ok(true)
    }
}

impl Simulation {
    /// Read attribute `A` of `id`. The null id reads the null entity.
    pub fn get<A: Attribute>(&self, id: EntityId) -> SimResult<A::Value> {
        Ok(A::cell(self.entity::<A::Entity>(id)?).clone())
    }

    /// Assign attribute `A` of `id`.
    pub fn set<A: Assignable>(&mut self, id: EntityId, value: A::Value) -> SimResult<()> {
        self.assign::<A>(id, value)
    }

    /// Re-evaluate identity `I` of `id` and store the result.
    pub fn evaluate<I: Identity>(&mut self, id: EntityId) -> SimResult<()> {
        let value = I::expression(self, id)?;
        self.assign::<I>(id, value)
    }

    /// Add `delta` to duration `D` of `id` if its condition holds.
    pub fn advance_duration<D: DurationAttribute>(
        &mut self,
        id: EntityId,
        delta: Time,
    ) -> SimResult<()> {
        if delta == 0.0 || !D::condition(self, id)? {
            return Ok(());
        }
        let value = self.get::<D>(id)? + delta;
        self.assign::<D>(id, value)
    }

    /// Set duration `D` of `id` back to zero.
    pub fn reset_duration<D: DurationAttribute>(&mut self, id: EntityId) -> SimResult<()> {
        self.assign::<D>(id, 0.0)
    }

    pub(crate) fn assign<A: Attribute>(&mut self, id: EntityId, value: A::Value) -> SimResult<()> {
        self.check_modification(A::NAME, id)?;
        if id.is_null() {
            return Err(InvariantViolation::NullEntityWrite(A::NAME).into());
        }
        let old = self.get::<A>(id)?;
        if old == value {
            return Ok(());
        }
        A::notify(self, id)?;
        *A::cell_mut(self.entity_mut::<A::Entity>(id)?) = value.clone();
        trace!(attribute = A::NAME, entity = %id, ?old, new = ?value, "attribute changed");
        A::side_effects(self, id, &old, &value)
    }
}
