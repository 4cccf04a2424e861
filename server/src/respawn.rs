//! One-shot respawn deadlines keyed by resource identity.
//!
//! Scheduling a resource that already has a deadline replaces it, and a
//! manual respawn cancels it, so a resource never has more than one pending
//! timer. Deadlines are world-clock readings checked on each server tick.

use log::debug;
use shared::{EntityId, Timestamp};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RespawnScheduler {
    pending: HashMap<EntityId, Timestamp>,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the timer for `entity` to fire at `at`.
    pub fn schedule(&mut self, entity: EntityId, at: Timestamp) {
        if let Some(previous) = self.pending.insert(entity, at) {
            debug!(
                "Respawn of resource {} moved from {:.2} to {:.2}",
                entity, previous, at
            );
        }
    }

    /// Returns true if a pending timer was removed.
    pub fn cancel(&mut self, entity: EntityId) -> bool {
        self.pending.remove(&entity).is_some()
    }

    pub fn deadline(&self, entity: EntityId) -> Option<Timestamp> {
        self.pending.get(&entity).copied()
    }

    /// Removes and returns every resource whose deadline has passed, earliest first.
    pub fn due(&mut self, now: Timestamp) -> Vec<EntityId> {
        let mut due: Vec<(EntityId, Timestamp)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(entity, at)| (*entity, *at))
            .collect();

        if due.is_empty() {
            return Vec::new();
        }

        due.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        for (entity, _) in &due {
            self.pending.remove(entity);
        }

        due.into_iter().map(|(entity, _)| entity).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
