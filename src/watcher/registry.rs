//! Per-pane watch slots.
//!
//! Maps each displayed pane to at most one active directory subscription
//! and keeps that mapping in sync with what the pane actually shows.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::pane::{DisplayKind, PaneId, Panes};

use super::source::{ChangeSource, WatchHandle};

/// One pane's subscription state.
///
/// The path and handle are stored as a single pair, so a slot holds a
/// handle exactly when it holds a path.
#[derive(Debug, Default)]
pub struct WatchSlot {
    watched: Option<(PathBuf, WatchHandle)>,
}

impl WatchSlot {
    /// Directory this slot is subscribed to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.watched.as_ref().map(|(path, _)| path.as_path())
    }

    /// Active handle of this slot, if any.
    pub fn handle(&self) -> Option<WatchHandle> {
        self.watched.as_ref().map(|(_, handle)| *handle)
    }
}

/// Maps panes to watch subscriptions.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    slots: Vec<WatchSlot>,
}

impl WatchRegistry {
    pub fn new(pane_count: usize) -> Self {
        let mut slots = Vec::with_capacity(pane_count);
        slots.resize_with(pane_count, WatchSlot::default);
        Self { slots }
    }

    /// Reconcile the slot count with the current pane count, releasing
    /// subscriptions of panes that no longer exist.
    pub fn sync_pane_count(&mut self, pane_count: usize, source: &mut dyn ChangeSource) {
        while self.slots.len() > pane_count {
            if let Some(slot) = self.slots.pop() {
                if let Some((_, handle)) = slot.watched {
                    let _ = source.remove_watch(handle);
                }
            }
        }
        self.slots.resize_with(pane_count, WatchSlot::default);
    }

    /// Idempotent synchronization of one pane's slot against what the pane
    /// currently shows.
    ///
    /// A pane is watchable only while it displays a plain local directory
    /// listing. Unwatchable panes lose their subscription; a path change
    /// migrates the subscription; an unchanged watchable pane is a no-op.
    /// When `add_watch` fails the slot is cleared, which makes the next
    /// refresh for this pane retry opportunistically.
    pub fn refresh(&mut self, pane: PaneId, panes: &dyn Panes, source: &mut dyn ChangeSource) {
        let Some(slot) = self.slots.get_mut(pane.0) else {
            return;
        };

        let watchable = match panes.display_kind(pane) {
            DisplayKind::LocalListing => panes.current_path(pane),
            DisplayKind::Virtual => None,
        };

        let Some(path) = watchable else {
            if let Some((path, handle)) = slot.watched.take() {
                let _ = source.remove_watch(handle);
                tracing::trace!("[watcher] pane {} unwatched: {}", pane.0, path.display());
            }
            return;
        };

        if slot.path() == Some(path.as_path()) {
            return;
        }

        if let Some((_, old)) = slot.watched.take() {
            let _ = source.remove_watch(old);
        }
        match source.add_watch(&path) {
            Ok(handle) => {
                tracing::trace!("[watcher] pane {} watching: {}", pane.0, path.display());
                slot.watched = Some((path, handle));
            }
            Err(e) => {
                // Pane stays unwatched; nothing is surfaced to the user.
                crate::debug_event!("watcher", "watch failed", "{e}");
            }
        }
    }

    /// Run [`refresh`](Self::refresh) for every pane.
    pub fn refresh_all(&mut self, panes: &dyn Panes, source: &mut dyn ChangeSource) {
        for index in 0..self.slots.len() {
            self.refresh(PaneId(index), panes, source);
        }
    }

    /// Release every subscription and clear all slots.
    pub fn clear(&mut self, source: &mut dyn ChangeSource) {
        for slot in &mut self.slots {
            if let Some((_, handle)) = slot.watched.take() {
                let _ = source.remove_watch(handle);
            }
        }
    }

    /// Panes whose slot handle appears in `touched`.
    ///
    /// Membership is tested per slot: two panes on the same directory share
    /// one handle, and a single event must mark both.
    pub fn panes_touched(&self, touched: &HashSet<WatchHandle>) -> Vec<PaneId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.handle().is_some_and(|h| touched.contains(&h)))
            .map(|(index, _)| PaneId(index))
            .collect()
    }

    /// Slot for `pane`, if the pane exists.
    pub fn slot(&self, pane: PaneId) -> Option<&WatchSlot> {
        self.slots.get(pane.0)
    }

    /// Number of slots currently holding a subscription.
    pub fn watched_count(&self) -> usize {
        self.slots.iter().filter(|s| s.watched.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::source::ManualSource;

    struct TestPanes {
        panes: Vec<(DisplayKind, Option<PathBuf>)>,
    }

    impl Panes for TestPanes {
        fn count(&self) -> usize {
            self.panes.len()
        }
        fn display_kind(&self, pane: PaneId) -> DisplayKind {
            self.panes[pane.0].0
        }
        fn current_path(&self, pane: PaneId) -> Option<PathBuf> {
            self.panes[pane.0].1.clone()
        }
        fn reload(&mut self, _pane: PaneId) {}
        fn repaint(&mut self) {}
    }

    fn local(path: &str) -> (DisplayKind, Option<PathBuf>) {
        (DisplayKind::LocalListing, Some(PathBuf::from(path)))
    }

    #[test]
    fn virtual_pane_never_acquires_a_watch() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let panes = TestPanes {
            panes: vec![(DisplayKind::Virtual, Some(PathBuf::from("/archive")))],
        };

        let mut registry = WatchRegistry::new(1);
        registry.refresh(PaneId(0), &panes, &mut source);

        assert!(registry.slot(PaneId(0)).unwrap().handle().is_none());
        assert_eq!(source.handle().active_watches(), 0);
    }

    #[test]
    fn switching_to_virtual_drops_the_watch() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let mut panes = TestPanes {
            panes: vec![local("/home")],
        };

        let mut registry = WatchRegistry::new(1);
        registry.refresh(PaneId(0), &panes, &mut source);
        assert_eq!(registry.watched_count(), 1);

        panes.panes[0] = (DisplayKind::Virtual, None);
        registry.refresh(PaneId(0), &panes, &mut source);
        assert_eq!(registry.watched_count(), 0);
        assert_eq!(source.handle().active_watches(), 0);
    }

    #[test]
    fn path_migration_swaps_the_subscription() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let handle = source.handle();
        let mut panes = TestPanes {
            panes: vec![local("/tmp")],
        };

        let mut registry = WatchRegistry::new(1);
        registry.refresh(PaneId(0), &panes, &mut source);

        panes.panes[0] = local("/tmp/sub");
        registry.refresh(PaneId(0), &panes, &mut source);

        let slot = registry.slot(PaneId(0)).unwrap();
        assert_eq!(slot.path(), Some(Path::new("/tmp/sub")));
        assert_eq!(handle.unwatch_calls(), vec![PathBuf::from("/tmp")]);
        assert_eq!(handle.active_watches(), 1);
    }

    #[test]
    fn unchanged_path_is_a_no_op() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let panes = TestPanes {
            panes: vec![local("/var/log")],
        };

        let mut registry = WatchRegistry::new(1);
        registry.refresh(PaneId(0), &panes, &mut source);
        registry.refresh(PaneId(0), &panes, &mut source);
        registry.refresh(PaneId(0), &panes, &mut source);

        // One add_watch call total: repeats must not touch the backend.
        assert_eq!(source.handle().watch_calls().len(), 1);
    }

    #[test]
    fn failed_watch_retries_on_next_refresh() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let handle = source.handle();
        handle.fail_path("/denied");
        let panes = TestPanes {
            panes: vec![local("/denied")],
        };

        let mut registry = WatchRegistry::new(1);
        registry.refresh(PaneId(0), &panes, &mut source);
        assert_eq!(registry.watched_count(), 0);

        // The cleared slot retries as soon as refresh runs again.
        handle.clear_failure(Path::new("/denied"));
        registry.refresh(PaneId(0), &panes, &mut source);
        assert_eq!(registry.watched_count(), 1);
    }

    #[test]
    fn shared_path_marks_both_panes() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let panes = TestPanes {
            panes: vec![local("/shared"), local("/shared")],
        };

        let mut registry = WatchRegistry::new(2);
        registry.refresh_all(&panes, &mut source);

        let left = registry.slot(PaneId(0)).unwrap().handle().unwrap();
        let right = registry.slot(PaneId(1)).unwrap().handle().unwrap();
        assert_eq!(left, right);

        let touched = HashSet::from([left]);
        assert_eq!(registry.panes_touched(&touched), vec![PaneId(0), PaneId(1)]);
    }

    #[test]
    fn clear_releases_everything() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let panes = TestPanes {
            panes: vec![local("/a"), local("/b")],
        };

        let mut registry = WatchRegistry::new(2);
        registry.refresh_all(&panes, &mut source);
        assert_eq!(source.handle().active_watches(), 2);

        registry.clear(&mut source);
        assert_eq!(registry.watched_count(), 0);
        assert_eq!(source.handle().active_watches(), 0);
    }

    #[test]
    fn sync_pane_count_drops_stale_slots() {
        let mut source = ManualSource::new();
        source.open().unwrap();
        let panes = TestPanes {
            panes: vec![local("/a"), local("/b")],
        };

        let mut registry = WatchRegistry::new(2);
        registry.refresh_all(&panes, &mut source);

        registry.sync_pane_count(1, &mut source);
        assert_eq!(source.handle().active_watches(), 1);

        registry.sync_pane_count(2, &mut source);
        assert!(registry.slot(PaneId(1)).unwrap().handle().is_none());
    }
}
