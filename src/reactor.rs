//! Readiness-dispatch contract consumed from the host event loop.
//!
//! The surrounding application runs a single-threaded reactor that
//! multiplexes every interactive input source. The watcher registers its two
//! sources here and the host calls
//! [`PaneWatcher::dispatch`](crate::watcher::PaneWatcher::dispatch) with the
//! matching token whenever one becomes ready. All callbacks run on the
//! reactor thread; nothing in this contract blocks.

use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::watcher::RawBatch;

/// Identifies one readiness source registered by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceToken {
    /// The change-notification queue has raw events to drain.
    Changes,
    /// The debounce timer deadline has passed.
    Debounce,
}

/// What the host loop waits on for one registered source.
pub enum WakeSource {
    /// Ready when the channel holds at least one message. The reactor must
    /// only observe readiness; the watcher drains the channel itself when
    /// dispatched.
    Channel(Receiver<RawBatch>),
    /// Ready when the deadline passes. `None` parks the source so it never
    /// wakes.
    Deadline(Option<Instant>),
}

/// Registration surface of the host reactor.
///
/// Re-registering a token replaces its wake source; the watcher uses this to
/// rearm and disarm its timer without churning registrations.
pub trait Reactor {
    /// Register or replace the wake source for `token`.
    fn register(&mut self, token: SourceToken, wake: WakeSource);

    /// Drop the registration for `token`. Unknown tokens are ignored.
    fn unregister(&mut self, token: SourceToken);
}
