//! Subsystem controller: lifecycle, quiet gate, and reactor dispatch.

use std::time::{Duration, Instant};

use crate::config::WatchConfig;
use crate::pane::{PaneId, Panes};
use crate::reactor::{Reactor, SourceToken, WakeSource};

use super::debounce::{DebounceTimer, PendingSet};
use super::registry::WatchRegistry;
use super::source::{ChangeSource, NotifySource};

/// Per-session state, created by `set_enabled(true)` and dropped by
/// `set_enabled(false)`. Nothing in here survives a disable/enable cycle.
struct Active {
    registry: WatchRegistry,
    timer: DebounceTimer,
    pending: PendingSet,
    quiet: bool,
}

/// Detects external modifications to the directories shown in the panes
/// and schedules debounced reloads.
///
/// All state is owned and mutated on the host's reactor thread: the public
/// operations and [`dispatch`](Self::dispatch) are the only mutation entry
/// points, and every one of them must be called from that thread. The type
/// deliberately carries no synchronization - it is not safe to share across
/// threads.
///
/// No failure in this subsystem ever reaches the user. If the change
/// backend cannot be acquired the watcher silently stays inert; if a single
/// directory cannot be watched that pane simply stops auto-refreshing.
pub struct PaneWatcher {
    config: WatchConfig,
    source: Box<dyn ChangeSource>,
    active: Option<Active>,
}

impl PaneWatcher {
    /// Controller over an injected change source.
    pub fn new(config: WatchConfig, source: Box<dyn ChangeSource>) -> Self {
        Self {
            config,
            source,
            active: None,
        }
    }

    /// Controller over the native platform backend.
    pub fn with_native(config: WatchConfig) -> Self {
        Self::new(config, Box::new(NotifySource::new()))
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// True while flushing is suppressed. Always false when disabled.
    pub fn is_quiet(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.quiet)
    }

    /// Change the debounce interval for subsequent arms. Values below one
    /// second are clamped at arm time.
    pub fn set_debounce_secs(&mut self, secs: u64) {
        self.config.debounce_secs = secs;
    }

    /// Enable or disable the whole subsystem. Idempotent, and infallible
    /// from the caller's point of view.
    ///
    /// Enabling opens the change source, registers both wake sources with
    /// the reactor, and installs watches for every watchable pane. If the
    /// source cannot be acquired the watcher stays logically disabled and
    /// nothing is surfaced. Enabling while already enabled re-synchronizes
    /// every pane slot instead, covering drift the watcher was not told
    /// about.
    ///
    /// Disabling unregisters both wake sources, releases every watch,
    /// closes the source, and drops all pending state including the quiet
    /// flag.
    pub fn set_enabled(&mut self, enabled: bool, panes: &dyn Panes, reactor: &mut dyn Reactor) {
        if enabled {
            self.enable(panes, reactor);
        } else {
            self.disable(reactor);
        }
    }

    fn enable(&mut self, panes: &dyn Panes, reactor: &mut dyn Reactor) {
        if let Some(active) = self.active.as_mut() {
            active
                .registry
                .sync_pane_count(panes.count(), self.source.as_mut());
            active.registry.refresh_all(panes, self.source.as_mut());
            return;
        }

        if let Err(e) = self.source.open() {
            // Stays logically disabled; a later enable may try again.
            crate::debug_event!("watcher", "backend unavailable", "{e}");
            return;
        }
        let Some(rx) = self.source.wake_receiver() else {
            self.source.close();
            return;
        };

        reactor.register(SourceToken::Changes, WakeSource::Channel(rx));
        reactor.register(SourceToken::Debounce, WakeSource::Deadline(None));

        let mut active = Active {
            registry: WatchRegistry::new(panes.count()),
            timer: DebounceTimer::new(),
            pending: PendingSet::new(),
            quiet: false,
        };
        active.registry.refresh_all(panes, self.source.as_mut());
        crate::log_event!(
            "watcher",
            "enabled",
            "{} of {} panes watched",
            active.registry.watched_count(),
            panes.count()
        );
        self.active = Some(active);
    }

    fn disable(&mut self, reactor: &mut dyn Reactor) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        reactor.unregister(SourceToken::Changes);
        reactor.unregister(SourceToken::Debounce);
        active.registry.clear(self.source.as_mut());
        self.source.close();
        crate::log_event!("watcher", "disabled");
        // `active` drops here: pending set, timer state and quiet flag go
        // with it.
    }

    /// Suppress or resume flushing around a bulk operation.
    ///
    /// Setting quiet only stops future flushes; raw events keep being
    /// collected. Clearing quiet with pending changes flushes them
    /// synchronously before returning, so the caller sees fresh panes the
    /// moment the gate reopens.
    pub fn set_quiet(&mut self, quiet: bool, panes: &mut dyn Panes, reactor: &mut dyn Reactor) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.quiet == quiet {
            return;
        }
        active.quiet = quiet;
        crate::debug_event!("watcher", "quiet", "{quiet}");

        if !quiet && !active.pending.is_empty() {
            Self::flush(active, panes, reactor);
        }
    }

    /// Keep watches in sync after `pane` changed its displayed directory.
    ///
    /// Must be called by pane-navigation code on every directory-identity
    /// change; it is deliberately not hooked to redraws.
    pub fn pane_dir_changed(&mut self, pane: PaneId, panes: &dyn Panes) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.registry.refresh(pane, panes, self.source.as_mut());
    }

    /// Reactor callback: a registered wake source became ready.
    ///
    /// `now` is the dispatch timestamp used to arm the debounce timer.
    pub fn dispatch(
        &mut self,
        token: SourceToken,
        panes: &mut dyn Panes,
        reactor: &mut dyn Reactor,
        now: Instant,
    ) {
        match token {
            SourceToken::Changes => self.on_changes(reactor, now),
            SourceToken::Debounce => self.on_timer_fired(panes, reactor),
        }
    }

    /// Drain the change queue and restart the quiescence window.
    fn on_changes(&mut self, reactor: &mut dyn Reactor, now: Instant) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let touched = self.source.drain();
        if touched.is_empty() {
            return;
        }
        let hit = active.registry.panes_touched(&touched);
        if hit.is_empty() {
            return;
        }
        for pane in hit {
            active.pending.mark(pane);
        }

        // Trailing-edge debounce: every burst restarts the full interval,
        // whether or not the timer was already armed.
        let interval = Duration::from_secs(self.config.debounce_secs.max(1));
        let deadline = active.timer.arm(now, interval);
        reactor.register(SourceToken::Debounce, WakeSource::Deadline(Some(deadline)));
        crate::debug_event!("watcher", "pending", "{} panes", active.pending.len());
    }

    /// Quiescence reached: flush unless the quiet gate is closed.
    fn on_timer_fired(&mut self, panes: &mut dyn Panes, reactor: &mut dyn Reactor) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if active.quiet {
            // Keep the pending set; it flushes when the gate reopens.
            active.timer.disarm();
            reactor.register(SourceToken::Debounce, WakeSource::Deadline(None));
            return;
        }

        Self::flush(active, panes, reactor);
    }

    /// Reload every pending pane, repaint once, return the timer to idle.
    fn flush(active: &mut Active, panes: &mut dyn Panes, reactor: &mut dyn Reactor) {
        // Snapshot and clear first: a reload that perturbs watcher state
        // must not erase a marking that lands during the loop.
        let pending = active.pending.take();
        for pane in &pending {
            panes.reload(*pane);
        }
        if !pending.is_empty() {
            panes.repaint();
            crate::debug_event!("watcher", "flushed", "{} panes", pending.len());
        }

        active.timer.disarm();
        reactor.register(SourceToken::Debounce, WakeSource::Deadline(None));
    }
}
