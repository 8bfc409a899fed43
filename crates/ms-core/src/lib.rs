//! Core data structures for the microsimulation runtime.
//!
//! Nothing in this crate knows about scheduling. It holds the leaf pieces the
//! scheduler is built from: entity identifiers, simulation time, the
//! order-statistics tree behind [`EntitySet`], sparse multilink storage and
//! the thread-safe run-status record polled by supervisors.

/// Entity identifiers and the per-run id generator.
pub mod entity;
/// Order-statistics indexed entity collections.
pub mod entity_set;
/// Error types used throughout the crate.
pub mod error;
/// Sparse slot storage backing multilinks.
pub mod link_slots;
/// Red-black tree augmented with subtree sizes.
pub mod ostree;
/// Run status, progress and timestamps for external supervision.
pub mod run_state;
/// Simulation time helpers.
pub mod time;

/// Re-export entity identifier types.
pub use entity::{EntityId, EntityIdGenerator};
/// Re-export the entity set.
pub use entity_set::EntitySet;
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export multilink storage.
pub use link_slots::{LinkSlots, SlotInsert};
/// Re-export the order-statistics tree.
pub use ostree::OsTree;
/// Re-export run-state types.
pub use run_state::{ModelStatus, RunState, RunStateHandle};
/// Re-export time helpers.
pub use time::{TIME_INFINITE, Time};
