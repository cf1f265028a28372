//! Pickup counting for collect-style levels.

use ahash::AHashSet;
use tracing::debug;

use crate::events::GameEvent;

/// Result of collecting a pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupOutcome {
    /// Counted, more remain.
    Counted {
        /// Collected so far
        current: u32,
        /// Pickups in the level
        total: u32,
    },
    /// Already counted, or no level is being tracked.
    Duplicate,
    /// The last pickup was collected.
    Complete {
        /// Pickups in the level
        total: u32,
    },
}

/// Counts distinct pickups collected in the current level.
#[derive(Debug, Clone, Default)]
pub struct PickupTracker {
    total: u32,
    collected: AHashSet<u32>,
    active: bool,
    events: Vec<GameEvent>,
}

impl PickupTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting a level with `total` pickups.
    pub fn begin(&mut self, total: u32) {
        self.total = total;
        self.collected.clear();
        self.active = true;
        self.events.push(GameEvent::CountChanged { current: 0, total });
    }

    /// Stops counting.
    pub fn end(&mut self) {
        self.active = false;
        self.collected.clear();
        self.total = 0;
    }

    /// Records a pickup. Ids already seen are ignored.
    pub fn collect(&mut self, id: u32) -> PickupOutcome {
        if !self.active || self.is_complete() || !self.collected.insert(id) {
            debug!(id, "Pickup ignored");
            return PickupOutcome::Duplicate;
        }

        let current = self.current();
        self.events.push(GameEvent::CountChanged {
            current,
            total: self.total,
        });

        if current >= self.total {
            PickupOutcome::Complete { total: self.total }
        } else {
            PickupOutcome::Counted {
                current,
                total: self.total,
            }
        }
    }

    /// Pickups collected.
    #[must_use]
    pub fn current(&self) -> u32 {
        u32::try_from(self.collected.len()).unwrap_or(u32::MAX)
    }

    /// Pickups in the level.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Whether a level is being counted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether every pickup was collected.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.active && self.total > 0 && self.current() >= self.total
    }

    /// Take pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
