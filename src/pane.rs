//! Pane accessor contract consumed from the surrounding UI.
//!
//! The watcher subsystem never owns pane objects. Callers lend the [`Panes`]
//! capability to each public operation, and panes are referred to by
//! [`PaneId`] only. This keeps the subsystem free of back-pointers into
//! UI-owned state.

use std::path::PathBuf;

/// Identifies one displayed directory view in the dual-pane UI.
///
/// Ids are positional: pane 0 is the left pane, pane 1 the right. The
/// watcher treats the id space as opaque and works for any pane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaneId(pub usize);

/// How a pane currently presents its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// A plain listing of a single local directory. The only kind that can
    /// be watched.
    LocalListing,
    /// Everything else: remote or archive VFS paths, panelized or
    /// aggregated result sets, info and quick-view modes.
    Virtual,
}

/// Accessor capability into the externally owned panes.
///
/// `reload` re-reads one pane's directory contents and `repaint` schedules a
/// single screen refresh. Both are called synchronously on the reactor
/// thread and must be bounded and non-blocking.
pub trait Panes {
    /// Number of displayed panes.
    fn count(&self) -> usize;

    /// Current presentation mode of `pane`.
    fn display_kind(&self, pane: PaneId) -> DisplayKind;

    /// Directory currently displayed by `pane`, if it has one.
    fn current_path(&self, pane: PaneId) -> Option<PathBuf>;

    /// Re-read the directory contents of `pane`.
    fn reload(&mut self, pane: PaneId);

    /// Schedule one screen refresh covering all panes.
    fn repaint(&mut self);
}
