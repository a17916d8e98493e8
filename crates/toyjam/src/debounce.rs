//! Per-slot quiet window for trigger lines
//!
//! Contact switches chatter. After a transition is accepted on a slot, every
//! further transition on that slot inside the window is dropped outright;
//! nothing is queued for later.

use std::time::Duration;

use tokio::time::Instant;

use crate::slot::{SlotId, SLOT_COUNT};

#[derive(Debug, Clone)]
pub struct DebounceFilter {
    window: Duration,
    last_accepted: [Option<Instant>; SLOT_COUNT],
}

impl DebounceFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: [None; SLOT_COUNT],
        }
    }

    /// Decide on a transition seen at `at`
    ///
    /// An event stamped earlier than the last accepted one counts as inside
    /// the window.
    pub fn accept(&mut self, slot: SlotId, at: Instant) -> bool {
        let last = &mut self.last_accepted[slot.index()];
        if let Some(prev) = *last {
            match at.checked_duration_since(prev) {
                Some(elapsed) if elapsed >= self.window => {}
                _ => return false,
            }
        }
        *last = Some(at);
        true
    }
}
