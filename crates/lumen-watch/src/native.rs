//! Native filesystem notifications.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::debouncer::EventDebouncer;
use crate::event::{CHANNEL_CAPACITY, WatchEventKind, WatchEventReceiver, WatchTasks};
use crate::{FileWatcher, Subscriptions, WatchError, absolute};

/// How often settled events are drained from the debouncer.
const DRAIN_TICK: Duration = Duration::from_millis(50);

/// Watcher backed by the platform notification API.
///
/// Directories are watched non-recursively: a subscribed file is observed
/// through its parent so that editors replacing the file (write to a temp
/// file, then rename) keep being tracked.
pub struct NotifyWatcher {
    state: Mutex<NativeState>,
    subscriptions: Arc<Mutex<Subscriptions>>,
    _tasks: WatchTasks,
}

struct NativeState {
    watcher: RecommendedWatcher,
    /// Watched directory to number of subscriptions relying on it.
    watched_dirs: HashMap<PathBuf, usize>,
    /// Subscribed path to the directory watched on its behalf.
    watched_for: HashMap<PathBuf, PathBuf>,
}

impl NotifyWatcher {
    /// Start a watcher that reports an event once `debounce` has passed
    /// without further changes to the same path.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(debounce: Duration) -> Result<(Self, WatchEventReceiver), WatchError> {
        let (raw_tx, mut raw_rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let debouncer = Arc::new(EventDebouncer::new(debounce));
        let subscriptions = Arc::new(Mutex::new(Subscriptions::default()));

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            // The callback runs on the notify thread, outside the runtime.
            Ok(event) => {
                let _ = raw_tx.blocking_send(event);
            }
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        })?;

        let record = {
            let debouncer = Arc::clone(&debouncer);
            let subscriptions = Arc::clone(&subscriptions);
            tokio::spawn(async move {
                while let Some(event) = raw_rx.recv().await {
                    record_event(&event, &subscriptions, &debouncer);
                }
            })
        };

        let drain = tokio::spawn(async move {
            let mut interval = tokio::time::interval(DRAIN_TICK);
            loop {
                interval.tick().await;
                for event in debouncer.drain_ready() {
                    tracing::debug!(path = %event.path.display(), kind = ?event.kind, "File changed");
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        let watcher = Self {
            state: Mutex::new(NativeState {
                watcher,
                watched_dirs: HashMap::new(),
                watched_for: HashMap::new(),
            }),
            subscriptions,
            _tasks: WatchTasks::new(vec![record, drain]),
        };
        Ok((watcher, WatchEventReceiver::new(event_rx)))
    }
}

/// Record a raw notification for every subscribed path it mentions.
fn record_event(event: &Event, subscriptions: &Mutex<Subscriptions>, debouncer: &EventDebouncer) {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Created,
        EventKind::Modify(_) => WatchEventKind::Modified,
        EventKind::Remove(_) => WatchEventKind::Removed,
        _ => return,
    };
    let subscriptions = subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
    for path in &event.paths {
        if subscriptions.matches(path) {
            debouncer.record(path.clone(), kind);
        }
    }
}

impl FileWatcher for NotifyWatcher {
    fn subscribe(&self, path: &Path) -> Result<(), WatchError> {
        let path = absolute(path)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.watched_for.contains_key(&path) {
            return Ok(());
        }

        let dir = if path.is_dir() {
            path.clone()
        } else {
            path.parent().map_or_else(|| path.clone(), Path::to_path_buf)
        };

        let count = state.watched_dirs.get(&dir).copied().unwrap_or(0);
        if count == 0 {
            state.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        }
        state.watched_dirs.insert(dir.clone(), count + 1);
        state.watched_for.insert(path.clone(), dir);

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path);
        Ok(())
    }

    fn unsubscribe(&self, path: &Path) {
        let Ok(path) = absolute(path) else {
            return;
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(dir) = state.watched_for.remove(&path) else {
            return;
        };

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&path);

        let count = state.watched_dirs.get(&dir).copied().unwrap_or(1);
        if count > 1 {
            state.watched_dirs.insert(dir, count - 1);
        } else {
            state.watched_dirs.remove(&dir);
            if let Err(e) = state.watcher.unwatch(&dir) {
                tracing::debug!(dir = %dir.display(), error = %e, "Failed to remove watch");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use std::fs;

    fn notify_event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_record_event_filters_subscriptions() {
        let subscriptions = Mutex::new(Subscriptions::default());
        subscriptions
            .lock()
            .unwrap()
            .insert(PathBuf::from("/site/templates"));
        let debouncer = EventDebouncer::new(Duration::ZERO);

        record_event(
            &notify_event(EventKind::Create(CreateKind::File), "/site/templates/nav.tpl"),
            &subscriptions,
            &debouncer,
        );
        record_event(
            &notify_event(EventKind::Modify(ModifyKind::Any), "/site/markdown/index.md"),
            &subscriptions,
            &debouncer,
        );
        record_event(
            &notify_event(EventKind::Access(notify::event::AccessKind::Any), "/site/templates"),
            &subscriptions,
            &debouncer,
        );

        std::thread::sleep(Duration::from_millis(5));
        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, PathBuf::from("/site/templates/nav.tpl"));
        assert_eq!(events[0].kind, WatchEventKind::Created);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("site.yaml");
        fs::write(&file, "a: 1").unwrap();

        let (watcher, _rx) = NotifyWatcher::start(Duration::from_millis(10)).unwrap();
        watcher.subscribe(&file).unwrap();
        watcher.subscribe(&file).unwrap();
        watcher.subscribe(dir.path()).unwrap();

        {
            let state = watcher.state.lock().unwrap();
            assert_eq!(state.watched_dirs.get(dir.path()), Some(&2));
        }

        watcher.unsubscribe(&file);
        watcher.unsubscribe(&file);
        {
            let state = watcher.state.lock().unwrap();
            assert_eq!(state.watched_dirs.get(dir.path()), Some(&1));
        }

        watcher.unsubscribe(dir.path());
        assert!(watcher.state.lock().unwrap().watched_dirs.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_missing_directory_fails() {
        let (watcher, _rx) = NotifyWatcher::start(Duration::from_millis(10)).unwrap();
        let result = watcher.subscribe(Path::new("/nonexistent/lumen/site.yaml"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_receiver_closes_when_watcher_dropped() {
        let (watcher, mut rx) = NotifyWatcher::start(Duration::from_millis(10)).unwrap();
        drop(watcher);

        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    // Timing-sensitive, depends on the platform notification latency.
    #[tokio::test]
    #[ignore = "depends on filesystem notification timing"]
    async fn test_detects_modification() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.tpl");
        fs::write(&file, "v1").unwrap();

        let (watcher, mut rx) = NotifyWatcher::start(Duration::from_millis(20)).unwrap();
        watcher.subscribe(&file).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&file, "v2").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(event.path.ends_with("index.tpl"));
    }
}
