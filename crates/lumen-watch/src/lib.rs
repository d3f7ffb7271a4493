//! File change notification for Lumen.
//!
//! A watcher tracks an explicit set of subscribed paths and reports changes
//! through a [`WatchEventReceiver`]:
//!
//! - a subscribed file reports its own changes;
//! - a subscribed directory additionally reports changes to its immediate
//!   entries (new or deleted templates, for example).
//!
//! Two backends implement [`FileWatcher`]:
//!
//! - [`NotifyWatcher`] uses native notifications through the `notify` crate
//!   and coalesces bursts of events per path.
//! - [`PollWatcher`] compares modification times on a fixed interval. It works
//!   on filesystems where native notifications are unreliable (network mounts,
//!   some container volumes).
//!
//! Both backends run on Tokio tasks and must be started inside a runtime.
//! Dropping a watcher aborts its tasks and closes the receiver.

mod debouncer;
mod event;
mod native;
mod poll;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use event::{WatchEvent, WatchEventKind, WatchEventReceiver};
pub use native::NotifyWatcher;
pub use poll::PollWatcher;

/// Error setting up or extending a watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Native watcher failure.
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),
    /// Path could not be resolved.
    #[error("Cannot watch {}: {source}", path.display())]
    Io {
        /// Path that was being subscribed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Subscription side of a watcher.
///
/// Subscribing an already subscribed path and unsubscribing an unknown path
/// are both no-ops.
pub trait FileWatcher: Send + Sync {
    /// Start reporting changes for `path`.
    fn subscribe(&self, path: &Path) -> Result<(), WatchError>;

    /// Stop reporting changes for `path`.
    fn unsubscribe(&self, path: &Path);
}

/// Set of subscribed absolute paths.
#[derive(Debug, Default)]
pub(crate) struct Subscriptions {
    paths: HashSet<PathBuf>,
}

impl Subscriptions {
    pub(crate) fn insert(&mut self, path: PathBuf) -> bool {
        self.paths.insert(path)
    }

    pub(crate) fn remove(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    /// Whether a change at `path` concerns a subscriber.
    pub(crate) fn matches(&self, path: &Path) -> bool {
        self.paths.contains(path) || path.parent().is_some_and(|dir| self.paths.contains(dir))
    }
}

/// Make `path` absolute without touching the filesystem.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, WatchError> {
    std::path::absolute(path).map_err(|source| WatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}
