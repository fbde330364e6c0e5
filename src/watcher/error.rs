//! Error types for the watcher subsystem.
//!
//! None of these cross the controller's public boundary. Every failure
//! degrades to fewer automatic refreshes; the hosting application keeps
//! running either way.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from change-source operations.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The change-notification backend could not be acquired. The subsystem
    /// stays logically disabled when this happens at enable time.
    #[error("change notification unavailable: {reason}")]
    Unavailable { reason: String },

    /// One directory could not be watched (permissions, races with
    /// deletion, watch quota). The affected pane is left unwatched; other
    /// panes are unaffected.
    #[error("cannot watch {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },

    /// A watch could not be removed, usually because it is already gone.
    /// Best-effort: call sites discard this and clear the slot regardless.
    #[error("cannot remove watch on {path}: {reason}")]
    RemoveFailed { path: PathBuf, reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::Unavailable {
            reason: e.to_string(),
        }
    }
}
