//! Host table and request routing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumen_config::{DEFAULT_HOST, Settings};
use lumen_site::Host;

/// Hosts keyed by `hostname[/path]`.
///
/// Hosts that failed to load keep their key: requests for them are answered
/// as unavailable instead of falling through to another site.
#[derive(Debug, Default, Clone)]
pub struct HostTable {
    hosts: BTreeMap<String, Arc<Host>>,
    failed: BTreeMap<String, PathBuf>,
}

/// Where a request goes.
#[derive(Debug, Clone)]
pub enum Route {
    /// A loaded host.
    Host(Arc<Host>),
    /// The host registered under this key could not be loaded.
    Failed(String),
}

impl HostTable {
    /// Load every host named in `settings`.
    ///
    /// A host that fails to load is logged and recorded as failed.
    #[must_use]
    pub fn build(settings: &Settings) -> Self {
        if !settings.has_default_host() {
            tracing::warn!(
                "No \"{DEFAULT_HOST}\" host configured; unmatched requests will get 404"
            );
        }

        let mut table = Self::default();
        for (name, root) in &settings.hosts_resolved {
            match Host::new(name.as_str(), root) {
                Ok(host) => {
                    table.hosts.insert(name.clone(), Arc::new(host));
                }
                Err(e) => {
                    tracing::error!(host = %name, root = %root.display(), error = %e, "Failed to load host");
                    table.failed.insert(name.clone(), root.clone());
                }
            }
        }
        table
    }

    /// Table over already loaded hosts, keyed by their names.
    pub fn from_hosts(hosts: impl IntoIterator<Item = Host>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| (host.name().to_owned(), Arc::new(host)))
                .collect(),
            failed: BTreeMap::new(),
        }
    }

    /// Route `path` on `hostname`. `hostname` may carry a port.
    #[must_use]
    pub fn route(&self, hostname: &str, path: &str) -> Option<Route> {
        let keys = self.hosts.keys().chain(self.failed.keys()).map(String::as_str);
        let key = route_key(keys, hostname, path)?;
        match self.hosts.get(key) {
            Some(host) => Some(Route::Host(Arc::clone(host))),
            None => Some(Route::Failed(key.to_owned())),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Host>> {
        self.hosts.get(name).map(Arc::clone)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Arc<Host>> {
        self.hosts.values()
    }

    /// Keys and document roots of hosts that failed to load.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.failed
            .iter()
            .map(|(name, root)| (name.as_str(), root.as_path()))
    }

    /// Number of loaded hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Copy of this table with `hosts` loaded in place of failed entries.
    #[must_use]
    pub fn with_recovered(&self, hosts: Vec<Host>) -> Self {
        let mut next = self.clone();
        for host in hosts {
            next.failed.remove(host.name());
            next.hosts.insert(host.name().to_owned(), Arc::new(host));
        }
        next
    }

    /// Every path any host, loaded or failed, wants watched.
    #[must_use]
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let loaded = self.hosts.values().flat_map(|host| host.watch_paths());
        let pending = self
            .failed
            .values()
            .flat_map(|root| Host::pending_watch_paths(root));
        loaded.chain(pending).collect()
    }
}

/// Pick the key for a request: the longest key that prefixes
/// `hostname + path`, else `default`.
///
/// Matching is a plain string prefix test, so `example.com/blog` also claims
/// `/blogroll`.
pub fn route_key<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    hostname: &str,
    path: &str,
) -> Option<&'a str> {
    let target = format!("{}{path}", strip_port(hostname));
    let mut fallback = None;
    let mut best: Option<&'a str> = None;

    for key in keys {
        if key == DEFAULT_HOST {
            fallback = Some(key);
        }
        if key.len() <= target.len()
            && target.starts_with(key)
            && best.is_none_or(|b| key.len() > b.len())
        {
            best = Some(key);
        }
    }
    best.or(fallback)
}

/// Remove a `:port` suffix from a Host header value.
#[must_use]
pub fn strip_port(hostname: &str) -> &str {
    if hostname.starts_with('[') {
        // Bracketed IPv6 literal.
        return hostname
            .find(']')
            .map_or(hostname, |end| &hostname[..=end]);
    }
    match hostname.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => hostname,
    }
}
