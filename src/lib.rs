pub mod config;
pub mod logging;
pub mod pane;
pub mod reactor;
pub mod watcher;

pub use config::{LoggingConfig, Settings, WatchConfig};
pub use pane::{DisplayKind, PaneId, Panes};
pub use reactor::{Reactor, SourceToken, WakeSource};
pub use watcher::{ChangeSource, ManualSource, NotifySource, NullSource, PaneWatcher, WatchError};
