//! Notification decision policy
//!
//! Pure evaluation of one classification batch against the watch table
//! and the per-event toggles. No engine state is touched here: the
//! caller passes the counter in and stores the advanced copy back,
//! which keeps the policy trivially testable.

use super::{CategoryResult, EventKind, WatchTable};
use crate::notify::NotificationRequest;
use serde::{Deserialize, Serialize};

/// Notification IDs cycle through this many slots before reuse.
pub const ID_WINDOW: u32 = 10;

/// Monotonic notification counter with windowed ID derivation
///
/// The counter itself never wraps; only the derived ID does. Passing
/// the counter by value and returning the advanced copy makes every
/// call site show where the sequence moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationCounter {
    value: u64,
}

impl NotificationCounter {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Counter positioned at an arbitrary point in the sequence.
    pub fn at(value: u64) -> Self {
        Self { value }
    }

    /// Total notifications issued so far.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// ID for the next notification, plus the advanced counter.
    ///
    /// The ID reflects the counter before the advance, so the first
    /// call on a fresh counter yields 0.
    pub fn next(self) -> (u32, Self) {
        let id = (self.value % u64::from(ID_WINDOW)) as u32;
        (id, Self { value: self.value + 1 })
    }
}

/// Per-event notification switches, all off until the user opts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventToggles {
    pub baby_crying: bool,
    pub glass_break: bool,
    pub gunshot: bool,
}

impl EventToggles {
    pub fn enabled(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::BabyCrying => self.baby_crying,
            EventKind::GlassBreak => self.glass_break,
            EventKind::Gunshot => self.gunshot,
        }
    }

    pub fn set(&mut self, kind: EventKind, enabled: bool) {
        match kind {
            EventKind::BabyCrying => self.baby_crying = enabled,
            EventKind::GlassBreak => self.glass_break = enabled,
            EventKind::Gunshot => self.gunshot = enabled,
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.baby_crying || self.glass_break || self.gunshot
    }
}

/// Evaluate one classification batch against the toggles.
///
/// Scans the batch once per event kind in `EventKind::ALL` order, so a
/// mixed batch always reports baby cries before glass breaks before
/// gunshots. Every matching entry produces its own request; duplicate
/// indices in the batch are not collapsed. Disabled kinds contribute
/// nothing and do not advance the counter.
///
/// # Arguments
/// * `table` - Index-to-event mapping, treated as read-only
/// * `results` - Scored categories from one inference pass
/// * `toggles` - Which event kinds the user has armed
/// * `counter` - Counter as of the previous batch
/// * `now_ms` - Milliseconds since engine start, stamped on each request
///
/// # Returns
/// The requests to post, in emission order, and the advanced counter.
pub fn evaluate(
    table: &WatchTable,
    results: &[CategoryResult],
    toggles: &EventToggles,
    counter: NotificationCounter,
    now_ms: u64,
) -> (Vec<NotificationRequest>, NotificationCounter) {
    let mut pending = Vec::new();
    let mut counter = counter;

    for kind in EventKind::ALL {
        if !toggles.enabled(kind) {
            continue;
        }
        for result in results {
            if table.kind_for(result.index) == Some(kind) {
                let (id, advanced) = counter.next();
                counter = advanced;
                pending.push(NotificationRequest::for_event(kind, id, now_ms));
            }
        }
    }

    (pending, counter)
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
