use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a simulated entity.
///
/// Ids are handed out in creation order starting at 1, so comparing two ids
/// compares creation order. Id 0 is reserved for the null entity that absent
/// links resolve to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null entity.
    pub const NULL: Self = Self(0);

    /// Returns `true` for the null entity.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Hands out entity ids for one simulation run.
#[derive(Debug, Clone)]
pub struct EntityIdGenerator {
    next: u64,
}

impl Default for EntityIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityIdGenerator {
    /// Create a generator whose first id is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}
