//! Directory change watching with debounced pane refresh.
//!
//! Detects when a directory displayed in a pane is modified by another
//! process and reloads the pane once the activity settles, without ever
//! blocking the interactive UI thread.
//!
//! # Architecture
//!
//! ```text
//! PaneWatcher (controller)
//!   - owns one ChangeSource (native notify / null / manual)
//!   - owns per-session state: WatchRegistry, DebounceTimer, PendingSet
//!   - registers two wake sources with the host Reactor
//!          |
//!     +---------------------+---------------------+
//!     |                     |                     |
//! ChangeSource        WatchRegistry         DebounceTimer
//! raw events ->       pane -> watch          one shared
//! touched handles     slot mapping           quiescence window
//! ```
//!
//! Raw kernel events arrive on the change wake source and are drained to
//! exhaustion; touched panes are marked pending and the shared timer is
//! rearmed to the full interval. When the timer wake source fires and the
//! quiet gate is open, every pending pane reloads and the screen repaints
//! once. Bulk operations close the gate with
//! [`PaneWatcher::set_quiet`]; changes keep accumulating and flush
//! synchronously when the gate reopens.

mod controller;
mod debounce;
mod error;
mod registry;
mod source;

pub use controller::PaneWatcher;
pub use debounce::{DebounceTimer, PendingSet};
pub use error::WatchError;
pub use registry::{WatchRegistry, WatchSlot};
pub use source::{
    ChangeSource, ManualHandle, ManualLog, ManualSource, NotifySource, NullSource, RawBatch,
    WatchHandle,
};
