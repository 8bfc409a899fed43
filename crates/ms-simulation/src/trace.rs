use ms_core::{EntityId, Time};

use crate::event::EventTypeId;

/// What a trace record describes.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceKind {
    /// An event fired.
    EventFired {
        /// Event name.
        event: &'static str,
        /// Event type id.
        id: EventTypeId,
        /// Owning entity.
        entity: EntityId,
    },
    /// A link changed target.
    LinkChanged {
        /// Entity holding the link.
        entity: EntityId,
        /// Link name.
        link: &'static str,
        /// Previous target.
        old: EntityId,
        /// New target.
        new: EntityId,
    },
    /// A multilink gained or lost a target.
    MultilinkChanged {
        /// Entity holding the multilink.
        entity: EntityId,
        /// Multilink name.
        multilink: &'static str,
        /// Target added or removed.
        target: EntityId,
        /// `true` for an insert, `false` for an erase.
        inserted: bool,
    },
    /// An entity entered the simulation.
    EntityEntered {
        /// The entity.
        entity: EntityId,
        /// Its type name.
        kind: &'static str,
    },
    /// An entity exited the simulation.
    EntityExited {
        /// The entity.
        entity: EntityId,
        /// Its type name.
        kind: &'static str,
    },
}

impl TraceKind {
    /// Check whether a given entity is involved in this record.
    pub fn involves(&self, id: EntityId) -> bool {
        match self {
            Self::EventFired { entity, .. }
            | Self::EntityEntered { entity, .. }
            | Self::EntityExited { entity, .. } => *entity == id,
            Self::LinkChanged {
                entity, old, new, ..
            } => *entity == id || *old == id || *new == id,
            Self::MultilinkChanged { entity, target, .. } => *entity == id || *target == id,
        }
    }
}

/// One observation in the trace log.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    /// Global time when it happened.
    pub time: Time,
    /// Number of events fired before it, this one included for fired events.
    pub event_counter: u64,
    /// What happened.
    pub kind: TraceKind,
}

/// Bounded log of trace records. Purely observational.
#[derive(Debug, Default)]
pub struct TraceLog {
    records: Vec<TraceRecord>,
    max_records: usize,
}

impl TraceLog {
    /// Create a log with the given maximum capacity (0 = unlimited).
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Vec::new(),
            max_records,
        }
    }

    /// Append a record, dropping the oldest if the log exceeds its capacity.
    pub fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
        if self.max_records > 0 && self.records.len() > self.max_records {
            let drain_count = self.records.len() - self.max_records;
            self.records.drain(..drain_count);
        }
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Records involving the given entity.
    pub fn records_for_entity(&self, id: EntityId) -> Vec<&TraceRecord> {
        self.records.iter().filter(|r| r.kind.involves(id)).collect()
    }

    /// Names of fired events in firing order.
    pub fn fired_events(&self) -> Vec<&'static str> {
        self.records
            .iter()
            .filter_map(|r| match r.kind {
                TraceKind::EventFired { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fired(counter: u64, entity: u64) -> TraceRecord {
        TraceRecord {
            time: counter as f64,
            event_counter: counter,
            kind: TraceKind::EventFired {
                event: "Tick",
                id: EventTypeId(0),
                entity: EntityId(entity),
            },
        }
    }

    #[test]
    fn trace_log_max_records_trims() {
        let mut log = TraceLog::new(2);
        for i in 0..5 {
            log.push(fired(i, 1));
        }
        assert_eq!(log.len(), 2);
        // Oldest records were dropped, newest remain
        assert_eq!(log.records()[0].event_counter, 3);
        assert_eq!(log.records()[1].event_counter, 4);
    }

    #[test]
    fn trace_log_unlimited_capacity() {
        let mut log = TraceLog::new(0);
        for i in 0..1000 {
            log.push(fired(i, 1));
        }
        assert_eq!(log.len(), 1000);
        assert_eq!(log.fired_events().len(), 1000);
    }

    #[test]
    fn link_change_involves_both_targets() {
        let kind = TraceKind::LinkChanged {
            entity: EntityId(1),
            link: "spouse",
            old: EntityId(2),
            new: EntityId(3),
        };
        assert!(kind.involves(EntityId(1)));
        assert!(kind.involves(EntityId(2)));
        assert!(kind.involves(EntityId(3)));
        assert!(!kind.involves(EntityId(4)));
    }

    #[test]
    fn filter_by_entity_and_clear() {
        let mut log = TraceLog::new(0);
        log.push(fired(1, 1));
        log.push(fired(2, 2));
        log.push(fired(3, 1));
        assert_eq!(log.records_for_entity(EntityId(1)).len(), 2);
        log.clear();
        assert!(log.is_empty());
    }
}
