//! Shared debounce timer and pending-refresh tracking.
//!
//! One timer models one global quiescence window for all panes rather than
//! per-pane timers; a burst touching both panes settles once and flushes
//! once. Timestamps are passed in by the caller so the state machine stays
//! deterministic under test.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::pane::PaneId;

/// Single one-shot quiescence timer shared by all panes.
///
/// Two states: idle (`deadline` is `None`) and armed. Arming always resets
/// to the full interval, so the window trails the last event instead of
/// capping total latency. A continuous event stream spaced closer than the
/// interval keeps pushing the deadline out until the stream stops.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm to `now + interval`, returning the new deadline for reactor
    /// registration. Arming an already armed timer discards the old
    /// deadline.
    pub fn arm(&mut self, now: Instant, interval: Duration) -> Instant {
        let deadline = now + interval;
        self.deadline = Some(deadline);
        deadline
    }

    /// Return to idle without firing.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Panes with unflushed changes.
///
/// Grows only from notifier drains, shrinks only when a flush takes the
/// whole set. Ordered, so flushes reload panes deterministically.
#[derive(Debug, Default)]
pub struct PendingSet {
    panes: BTreeSet<PaneId>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `pane` needs a refresh.
    pub fn mark(&mut self, pane: PaneId) {
        self.panes.insert(pane);
    }

    /// Take the whole set, leaving it empty.
    pub fn take(&mut self) -> BTreeSet<PaneId> {
        std::mem::take(&mut self.panes)
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.panes.contains(&pane)
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }
}
