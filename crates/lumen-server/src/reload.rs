//! Hot reload of settings and templates.
//!
//! A Tokio task listens to a [`FileWatcher`] subscribed to the global
//! settings file and to every host's `site.yaml`, templates directory and
//! template files:
//!
//! - a settings file change rebuilds the whole host table and swaps it in;
//! - any other change reloads the hosts that watch the changed path, and
//!   retries hosts that failed to load.
//!
//! After each event the subscriptions are brought in line with the current
//! table, so new templates and new hosts are watched and dropped ones are not.
//! The filesystem work runs on the blocking pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lumen_config::{Settings, WatchBackend};
use lumen_site::Host;
use lumen_watch::{
    FileWatcher, NotifyWatcher, PollWatcher, WatchError, WatchEvent, WatchEventReceiver,
};
use tokio::task::JoinHandle;

use crate::error::ServerError;
use crate::state::AppState;
use crate::table::HostTable;

/// Owns the reload task. Dropping it stops the task and the watcher.
pub struct ReloadManager {
    task: JoinHandle<()>,
}

impl ReloadManager {
    /// Start watching with the backend selected in `settings.watch`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the watcher cannot be started or the settings path cannot
    /// be made absolute.
    pub fn start(state: Arc<AppState>, settings: &Settings) -> Result<Self, ServerError> {
        let interval = Duration::from_millis(settings.watch.interval_ms);
        let (watcher, events): (Arc<dyn FileWatcher>, WatchEventReceiver) =
            match settings.watch.backend {
                WatchBackend::Notify => {
                    let (watcher, events) = NotifyWatcher::start(interval)?;
                    (Arc::new(watcher), events)
                }
                WatchBackend::Poll => {
                    let (watcher, events) = PollWatcher::start(interval)?;
                    (Arc::new(watcher), events)
                }
            };

        let settings_path =
            std::path::absolute(&settings.config_path).map_err(|source| WatchError::Io {
                path: settings.config_path.clone(),
                source,
            })?;
        let reloader = Reloader::new(state, watcher, settings_path);
        tracing::info!(backend = ?settings.watch.backend, "Watching for changes");

        Ok(Self {
            task: tokio::spawn(run(reloader, events)),
        })
    }
}

impl Drop for ReloadManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribe, then handle events until the watcher goes away.
async fn run(mut reloader: Reloader, mut events: WatchEventReceiver) {
    let mut pending = None;
    loop {
        let result = tokio::task::spawn_blocking(move || {
            match &pending {
                Some(event) => reloader.handle(event),
                None => reloader.sync_subscriptions(),
            }
            reloader
        })
        .await;
        reloader = match result {
            Ok(reloader) => reloader,
            Err(e) => {
                tracing::error!(error = %e, "Reload task failed, hot reload stopped");
                return;
            }
        };

        let Some(event) = events.recv().await else {
            tracing::debug!("Watcher closed, hot reload stopped");
            return;
        };
        pending = Some(event);
    }
}

/// Event handling, separate from the task so it can run synchronously.
struct Reloader {
    state: Arc<AppState>,
    watcher: Arc<dyn FileWatcher>,
    settings_path: PathBuf,
    watched: HashSet<PathBuf>,
}

impl Reloader {
    fn new(state: Arc<AppState>, watcher: Arc<dyn FileWatcher>, settings_path: PathBuf) -> Self {
        Self {
            state,
            watcher,
            settings_path,
            watched: HashSet::new(),
        }
    }

    fn handle(&mut self, event: &WatchEvent) {
        tracing::debug!(path = %event.path.display(), kind = ?event.kind, "Change detected");
        if event.path == self.settings_path {
            self.reload_settings();
        } else {
            self.reload_hosts(&event.path);
        }
        self.sync_subscriptions();
    }

    fn reload_settings(&self) {
        match Settings::load(&self.settings_path, None) {
            Ok(settings) => {
                let table = HostTable::build(&settings);
                tracing::info!(hosts = table.len(), "Settings reloaded");
                // In-flight requests keep the old hosts alive until they finish.
                drop(self.state.replace_table(table));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload settings, keeping current hosts");
            }
        }
    }

    fn reload_hosts(&self, changed: &Path) {
        let table = self.state.table();
        for host in table.hosts() {
            if !concerns(&host.watch_paths(), changed) {
                continue;
            }
            if let Err(e) = host.reload() {
                tracing::error!(host = %host.name(), error = %e, "Failed to reload host, host disabled");
            }
        }

        let recovered: Vec<Host> = table
            .failed()
            .filter(|(_, root)| concerns(&Host::pending_watch_paths(root), changed))
            .filter_map(|(name, root)| match Host::new(name, root) {
                Ok(host) => Some(host),
                Err(e) => {
                    tracing::warn!(host = %name, error = %e, "Host still fails to load");
                    None
                }
            })
            .collect();
        if !recovered.is_empty() {
            tracing::info!(hosts = recovered.len(), "Failed hosts loaded");
            drop(self.state.replace_table(table.with_recovered(recovered)));
        }
    }

    /// Subscribe what the current table needs and drop everything else.
    fn sync_subscriptions(&mut self) {
        let mut wanted: HashSet<PathBuf> = self.state.table().watch_paths().into_iter().collect();
        wanted.insert(self.settings_path.clone());

        for path in self.watched.difference(&wanted) {
            self.watcher.unsubscribe(path);
        }
        self.watched.retain(|path| wanted.contains(path));

        for path in wanted {
            if self.watched.contains(&path) {
                continue;
            }
            match self.watcher.subscribe(&path) {
                Ok(()) => {
                    self.watched.insert(path);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Cannot watch path"),
            }
        }
    }
}

/// Whether a change at `changed` affects a host watching `paths`.
fn concerns(paths: &[PathBuf], changed: &Path) -> bool {
    paths
        .iter()
        .any(|path| path == changed || changed.parent() == Some(path.as_path()))
}
