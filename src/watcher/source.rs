//! Change-notification sources.
//!
//! Wraps the OS directory-change primitive behind the [`ChangeSource`]
//! capability so the controller is written once against the trait:
//!
//! - [`NotifySource`] - native backend over the `notify` crate. Raw events
//!   are forwarded from the backend's delivery callback into a
//!   crossbeam channel and drained on the reactor thread.
//! - [`NullSource`] - fallback that accepts watches and never reports an
//!   event, for platforms or builds without a native backend.
//! - [`ManualSource`] - deterministic in-memory source for tests.
//!
//! Watching the same directory from two panes yields the *same*
//! [`WatchHandle`] backed by one subscription, so a single underlying event
//! can mark both panes pending. Handles are reference counted internally;
//! the subscription is dropped when the last holder removes it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use notify::{RecursiveMode, Watcher};

use super::error::WatchError;

/// Opaque token identifying one active directory subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

/// One batch of raw change paths forwarded from a backend callback.
///
/// Carries only the touched paths. Event subtype and ordering are not
/// needed downstream; the drain step reduces batches to a set of handles.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub paths: Vec<PathBuf>,
}

/// Capability over one change-notification backend.
///
/// All methods are non-blocking. `open`/`close` bracket the backend
/// resource; `add_watch`/`remove_watch` manage subscriptions; `drain` is
/// called from reactor dispatch when the wake channel is ready.
pub trait ChangeSource {
    /// Acquire the backend resource. Failure is non-fatal to the caller;
    /// repeated calls while open are no-ops.
    fn open(&mut self) -> Result<(), WatchError>;

    /// True between a successful [`open`](Self::open) and the next
    /// [`close`](Self::close).
    fn is_open(&self) -> bool;

    /// Subscribe to one directory: entry creation and deletion, renames in
    /// and out, deletion of the directory itself, attribute changes.
    /// Adding a path that is already watched returns the existing handle.
    fn add_watch(&mut self, path: &Path) -> Result<WatchHandle, WatchError>;

    /// Best-effort unsubscribe. Callers discard the result; the handle is
    /// invalid afterwards regardless.
    fn remove_watch(&mut self, handle: WatchHandle) -> Result<(), WatchError>;

    /// Clone of the raw-event receiver, for reactor registration. The
    /// reactor only observes readiness on it; consumption happens in
    /// [`drain`](Self::drain). `None` while the source is not open.
    fn wake_receiver(&self) -> Option<Receiver<RawBatch>>;

    /// Read the raw-event queue to exhaustion and return the distinct
    /// handles that had at least one event.
    fn drain(&mut self) -> HashSet<WatchHandle>;

    /// Release the backend resource. Safe to call when not open.
    fn close(&mut self);
}

/// Subscription table shared by the concrete sources.
///
/// Maps watched paths to reference-counted handles and resolves raw event
/// paths back to handles. An event path matches a subscription either
/// directly (the watched directory itself changed) or through its parent
/// (an entry inside the watched directory changed).
#[derive(Debug, Default)]
struct WatchTable {
    by_path: HashMap<PathBuf, WatchEntry>,
    by_handle: HashMap<WatchHandle, PathBuf>,
    next_handle: u64,
}

#[derive(Debug)]
struct WatchEntry {
    handle: WatchHandle,
    refs: usize,
}

impl WatchTable {
    /// Existing handle for `path`, bumping its reference count.
    fn retain(&mut self, path: &Path) -> Option<WatchHandle> {
        let entry = self.by_path.get_mut(path)?;
        entry.refs += 1;
        Some(entry.handle)
    }

    /// Record a fresh subscription for `path`.
    fn insert(&mut self, path: PathBuf) -> WatchHandle {
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.by_path
            .insert(path.clone(), WatchEntry { handle, refs: 1 });
        self.by_handle.insert(handle, path);
        handle
    }

    /// Drop one reference to `handle`. Returns the path whose backend
    /// subscription should be released, if this was the last reference.
    fn release(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        let path = self.by_handle.get(&handle)?.clone();
        let entry = self.by_path.get_mut(&path)?;
        entry.refs -= 1;
        if entry.refs > 0 {
            return None;
        }
        self.by_path.remove(&path);
        self.by_handle.remove(&handle);
        Some(path)
    }

    /// Handles touched by one raw event path.
    fn resolve(&self, path: &Path, touched: &mut HashSet<WatchHandle>) {
        if let Some(entry) = self.by_path.get(path) {
            touched.insert(entry.handle);
        }
        if let Some(parent) = path.parent() {
            if let Some(entry) = self.by_path.get(parent) {
                touched.insert(entry.handle);
            }
        }
    }

    fn active_watches(&self) -> usize {
        self.by_path.len()
    }
}

/// Native change source over `notify`'s recommended platform backend.
///
/// The backend delivers events on its own thread; the callback forwards
/// them into an unbounded channel consumed on the reactor thread, so all
/// subsystem state stays single-threaded.
#[derive(Default)]
pub struct NotifySource {
    state: Option<NotifyState>,
}

struct NotifyState {
    watcher: notify::RecommendedWatcher,
    rx: Receiver<RawBatch>,
    table: WatchTable,
}

impl NotifySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeSource for NotifySource {
    fn open(&mut self) -> Result<(), WatchError> {
        if self.state.is_some() {
            return Ok(());
        }
        let (tx, rx) = unbounded();
        let watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                // Backend errors carry nothing actionable for refresh
                // scheduling; affected panes simply stop auto-refreshing.
                if let Ok(event) = res {
                    let _ = tx.send(RawBatch { paths: event.paths });
                }
            })?;
        self.state = Some(NotifyState {
            watcher,
            rx,
            table: WatchTable::default(),
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn add_watch(&mut self, path: &Path) -> Result<WatchHandle, WatchError> {
        let Some(state) = self.state.as_mut() else {
            return Err(WatchError::Unavailable {
                reason: "source not open".to_string(),
            });
        };
        if let Some(handle) = state.table.retain(path) {
            return Ok(handle);
        }
        state
            .watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::WatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(state.table.insert(path.to_path_buf()))
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> Result<(), WatchError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        let Some(path) = state.table.release(handle) else {
            return Ok(());
        };
        state
            .watcher
            .unwatch(&path)
            .map_err(|e| WatchError::RemoveFailed {
                path,
                reason: e.to_string(),
            })
    }

    fn wake_receiver(&self) -> Option<Receiver<RawBatch>> {
        self.state.as_ref().map(|s| s.rx.clone())
    }

    fn drain(&mut self) -> HashSet<WatchHandle> {
        let mut touched = HashSet::new();
        let Some(state) = self.state.as_mut() else {
            return touched;
        };
        for batch in state.rx.try_iter() {
            for path in &batch.paths {
                state.table.resolve(path, &mut touched);
            }
        }
        touched
    }

    fn close(&mut self) {
        // Dropping the backend watcher releases every subscription.
        self.state = None;
    }
}

/// Fallback source that accepts watches but never reports an event.
///
/// Used where no native backend is wanted; the subsystem behaves exactly as
/// if the watched directories were never modified.
#[derive(Debug, Default)]
pub struct NullSource {
    channel: Option<(Sender<RawBatch>, Receiver<RawBatch>)>,
    next_handle: u64,
}

impl NullSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeSource for NullSource {
    fn open(&mut self) -> Result<(), WatchError> {
        if self.channel.is_none() {
            self.channel = Some(unbounded());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    fn add_watch(&mut self, _path: &Path) -> Result<WatchHandle, WatchError> {
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn remove_watch(&mut self, _handle: WatchHandle) -> Result<(), WatchError> {
        Ok(())
    }

    fn wake_receiver(&self) -> Option<Receiver<RawBatch>> {
        self.channel.as_ref().map(|(_, rx)| rx.clone())
    }

    fn drain(&mut self) -> HashSet<WatchHandle> {
        HashSet::new()
    }

    fn close(&mut self) {
        self.channel = None;
    }
}

/// Deterministic in-memory source for tests.
///
/// Does not touch the OS. Tests inject raw batches through a
/// [`ManualHandle`] and can force `add_watch` failures per path; watch and
/// unwatch traffic is recorded so tests can assert on subscription leaks.
/// Same-path deduplication and reference counting match [`NotifySource`].
pub struct ManualSource {
    open: bool,
    tx: Sender<RawBatch>,
    rx: Receiver<RawBatch>,
    table: WatchTable,
    log: Rc<RefCell<ManualLog>>,
}

/// Recorded traffic of a [`ManualSource`], shared with its handles.
#[derive(Debug, Default)]
pub struct ManualLog {
    pub watch_calls: Vec<PathBuf>,
    pub unwatch_calls: Vec<PathBuf>,
    pub active_watches: usize,
    pub fail_paths: HashSet<PathBuf>,
    pub fail_open: bool,
}

/// Cloneable handle for driving a [`ManualSource`] after it has been moved
/// into the controller.
#[derive(Clone)]
pub struct ManualHandle {
    tx: Sender<RawBatch>,
    log: Rc<RefCell<ManualLog>>,
}

impl ManualHandle {
    /// Inject one raw event batch.
    pub fn push(&self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) {
        let paths = paths.into_iter().map(Into::into).collect();
        let _ = self.tx.send(RawBatch { paths });
    }

    /// Make `add_watch` fail for `path` until cleared.
    pub fn fail_path(&self, path: impl Into<PathBuf>) {
        self.log.borrow_mut().fail_paths.insert(path.into());
    }

    /// Make the next `open` fail, simulating a platform without the
    /// change-notification primitive.
    pub fn fail_open(&self, fail: bool) {
        self.log.borrow_mut().fail_open = fail;
    }

    /// Stop failing `add_watch` for `path`.
    pub fn clear_failure(&self, path: &Path) {
        self.log.borrow_mut().fail_paths.remove(path);
    }

    /// Number of live subscriptions.
    pub fn active_watches(&self) -> usize {
        self.log.borrow().active_watches
    }

    /// Paths passed to `add_watch`, in call order.
    pub fn watch_calls(&self) -> Vec<PathBuf> {
        self.log.borrow().watch_calls.clone()
    }

    /// Paths released back to the backend, in call order.
    pub fn unwatch_calls(&self) -> Vec<PathBuf> {
        self.log.borrow().unwatch_calls.clone()
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSource {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            open: false,
            tx,
            rx,
            table: WatchTable::default(),
            log: Rc::new(RefCell::new(ManualLog::default())),
        }
    }

    /// Handle for injecting events and inspecting traffic once the source
    /// is owned by the controller.
    pub fn handle(&self) -> ManualHandle {
        ManualHandle {
            tx: self.tx.clone(),
            log: self.log.clone(),
        }
    }
}

impl ChangeSource for ManualSource {
    fn open(&mut self) -> Result<(), WatchError> {
        if self.log.borrow().fail_open {
            return Err(WatchError::Unavailable {
                reason: "injected failure".to_string(),
            });
        }
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn add_watch(&mut self, path: &Path) -> Result<WatchHandle, WatchError> {
        if !self.open {
            return Err(WatchError::Unavailable {
                reason: "source not open".to_string(),
            });
        }
        let mut log = self.log.borrow_mut();
        log.watch_calls.push(path.to_path_buf());
        if log.fail_paths.contains(path) {
            return Err(WatchError::WatchFailed {
                path: path.to_path_buf(),
                reason: "injected failure".to_string(),
            });
        }
        if let Some(handle) = self.table.retain(path) {
            return Ok(handle);
        }
        let handle = self.table.insert(path.to_path_buf());
        log.active_watches = self.table.active_watches();
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> Result<(), WatchError> {
        if let Some(path) = self.table.release(handle) {
            let mut log = self.log.borrow_mut();
            log.unwatch_calls.push(path);
            log.active_watches = self.table.active_watches();
        }
        Ok(())
    }

    fn wake_receiver(&self) -> Option<Receiver<RawBatch>> {
        self.open.then(|| self.rx.clone())
    }

    fn drain(&mut self) -> HashSet<WatchHandle> {
        let mut touched = HashSet::new();
        if !self.open {
            return touched;
        }
        for batch in self.rx.try_iter() {
            for path in &batch.paths {
                self.table.resolve(path, &mut touched);
            }
        }
        touched
    }

    fn close(&mut self) {
        self.open = false;
        self.table = WatchTable::default();
        self.log.borrow_mut().active_watches = 0;
        // Drop anything still queued so a later open starts clean.
        while self.rx.try_recv().is_ok() {}
    }
}
