//! Watch event types and the channel they are delivered through.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the channels between a backend and its consumer.
pub(crate) const CHANNEL_CAPACITY: usize = 100;

/// Kind of file change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// File appeared.
    Created,
    /// File content or metadata changed.
    Modified,
    /// File disappeared.
    Removed,
}

/// A change to a subscribed path, or to an entry of a subscribed directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path of the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: WatchEventKind,
}

/// Receiving end of a watcher.
#[derive(Debug)]
pub struct WatchEventReceiver {
    rx: mpsc::Receiver<WatchEvent>,
}

impl WatchEventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the watcher has been dropped and every pending
    /// event was received.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

/// Background tasks of a watcher, aborted when the watcher is dropped.
pub(crate) struct WatchTasks {
    handles: Vec<JoinHandle<()>>,
}

impl WatchTasks {
    pub(crate) fn new(handles: Vec<JoinHandle<()>>) -> Self {
        Self { handles }
    }
}

impl Drop for WatchTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
