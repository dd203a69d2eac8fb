//! Per-entity single-flight registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::{domain::EntityRef, protocol::EntityState};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub entity: EntityRef,
    pub previous: EntityState,
    pub predicted: EntityState,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted(PendingMutation),
    /// Another mutation on the same entity has not resolved yet.
    Rejected,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

#[derive(Default)]
pub struct MutationGuard {
    pending: Mutex<HashMap<String, PendingMutation>>,
}

impl MutationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(
        &self,
        entity: EntityRef,
        previous: impl Into<EntityState>,
        predicted: impl Into<EntityState>,
    ) -> Admission {
        let mut pending = self.pending.lock();
        let key = entity.key();
        if pending.contains_key(&key) {
            return Admission::Rejected;
        }

        let record = PendingMutation {
            entity,
            previous: previous.into(),
            predicted: predicted.into(),
            started_at: Utc::now(),
        };
        pending.insert(key, record.clone());
        Admission::Admitted(record)
    }

    /// Releases the entity whatever the outcome was.
    pub fn end(&self, entity: &EntityRef) -> Option<PendingMutation> {
        self.pending.lock().remove(&entity.key())
    }

    pub fn pending(&self, entity: &EntityRef) -> Option<PendingMutation> {
        self.pending.lock().get(&entity.key()).cloned()
    }

    pub fn is_pending(&self, entity: &EntityRef) -> bool {
        self.pending.lock().contains_key(&entity.key())
    }

    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
#[path = "tests/guard_tests.rs"]
mod tests;
