//! Coalescing of bursts of raw notifications.
//!
//! Editors usually emit several events per save (truncate, write, chmod, or
//! write-to-temp plus rename). The debouncer keeps one pending event per path
//! and releases it once no new event arrived for the debounce window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::event::{WatchEvent, WatchEventKind};

struct Pending {
    kind: WatchEventKind,
    deadline: Instant,
}

pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    window: Duration,
}

impl EventDebouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a raw event, merging it with any pending event for the path.
    pub(crate) fn record(&self, path: PathBuf, kind: WatchEventKind) {
        let deadline = Instant::now() + self.window;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        let merged = match pending.get(&path) {
            Some(existing) => merge(existing.kind, kind),
            None => Some(kind),
        };
        match merged {
            Some(kind) => {
                pending.insert(path, Pending { kind, deadline });
            }
            None => {
                pending.remove(&path);
            }
        }
    }

    /// Take every event whose debounce window has passed.
    pub(crate) fn drain_ready(&self) -> Vec<WatchEvent> {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ready: Vec<WatchEvent> = pending
            .extract_if(|_, event| event.deadline <= now)
            .map(|(path, event)| WatchEvent {
                path,
                kind: event.kind,
            })
            .collect();
        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }
}

/// Merge a new event into a pending one.
///
/// `None` means the file appeared and vanished within one window, so nothing
/// is reported.
#[allow(clippy::match_same_arms)]
fn merge(pending: WatchEventKind, new: WatchEventKind) -> Option<WatchEventKind> {
    use WatchEventKind::{Created, Modified, Removed};

    match (pending, new) {
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        (Modified, kind) => Some(kind),
        (Removed, Created) => Some(Modified),
        (Removed, _) => Some(Removed),
    }
}
