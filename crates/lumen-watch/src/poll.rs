//! Modification time polling.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::event::{CHANNEL_CAPACITY, WatchEvent, WatchEventKind, WatchEventReceiver, WatchTasks};
use crate::{FileWatcher, Subscriptions, WatchError, absolute};

/// Watcher that stats every subscribed path on a fixed interval.
///
/// A path is reported as modified when its mtime differs from the previous
/// observation. Two writes within the same mtime granularity are
/// indistinguishable.
pub struct PollWatcher {
    state: Arc<Mutex<PollState>>,
    _tasks: WatchTasks,
}

#[derive(Default)]
struct PollState {
    subscriptions: Subscriptions,
    /// Last observed mtime of every file covered by a subscription.
    snapshot: HashMap<PathBuf, SystemTime>,
}

impl PollState {
    fn observe(&self) -> HashMap<PathBuf, SystemTime> {
        let mut observed = HashMap::new();
        for path in self.subscriptions.iter() {
            scan_into(path, &mut observed);
        }
        observed
    }

    /// Take a new observation and report what changed since the last one.
    fn poll(&mut self) -> Vec<WatchEvent> {
        let observed = self.observe();
        let events = diff(&self.snapshot, &observed);
        self.snapshot = observed;
        events
    }
}

/// Record the mtime of `path` and, for a directory, of its entries.
fn scan_into(path: &Path, observed: &mut HashMap<PathBuf, SystemTime>) {
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    if let Ok(mtime) = metadata.modified() {
        observed.insert(path.to_path_buf(), mtime);
    }
    if !metadata.is_dir() {
        return;
    }
    let Ok(entries) = fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        if let Ok(mtime) = entry.metadata().and_then(|m| m.modified()) {
            observed.insert(entry.path(), mtime);
        }
    }
}

/// Compare two observations.
fn diff(
    before: &HashMap<PathBuf, SystemTime>,
    after: &HashMap<PathBuf, SystemTime>,
) -> Vec<WatchEvent> {
    let mut events: Vec<WatchEvent> = after
        .iter()
        .filter_map(|(path, mtime)| {
            let kind = match before.get(path) {
                None => WatchEventKind::Created,
                Some(previous) if previous != mtime => WatchEventKind::Modified,
                Some(_) => return None,
            };
            Some(WatchEvent {
                path: path.clone(),
                kind,
            })
        })
        .chain(
            before
                .keys()
                .filter(|path| !after.contains_key(*path))
                .map(|path| WatchEvent {
                    path: path.clone(),
                    kind: WatchEventKind::Removed,
                }),
        )
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

impl PollWatcher {
    /// Start polling every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(interval: Duration) -> Result<(Self, WatchEventReceiver), WatchError> {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let state = Arc::new(Mutex::new(PollState::default()));

        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let state = Arc::clone(&task_state);
                let scan = tokio::task::spawn_blocking(move || {
                    state.lock().unwrap_or_else(PoisonError::into_inner).poll()
                });
                let events = match scan.await {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::error!(error = %e, "Poll scan failed");
                        return;
                    }
                };
                for event in events {
                    tracing::debug!(path = %event.path.display(), kind = ?event.kind, "File changed");
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok((
            Self {
                state,
                _tasks: WatchTasks::new(vec![task]),
            },
            WatchEventReceiver::new(event_rx),
        ))
    }
}

impl FileWatcher for PollWatcher {
    fn subscribe(&self, path: &Path) -> Result<(), WatchError> {
        let path = absolute(path)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.subscriptions.insert(path.clone()) {
            // Baseline so the first poll does not report existing files.
            let mut baseline = HashMap::new();
            scan_into(&path, &mut baseline);
            for (file, mtime) in baseline {
                state.snapshot.entry(file).or_insert(mtime);
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, path: &Path) {
        let Ok(path) = absolute(path) else {
            return;
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.subscriptions.remove(&path) {
            let PollState {
                subscriptions,
                snapshot,
            } = &mut *state;
            snapshot.retain(|file, _| subscriptions.matches(file));
        }
    }
}
