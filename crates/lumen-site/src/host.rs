//! Virtual host: one document root served under a host key.
//!
//! A [`Host`] owns the parsed `site.yaml` and the compiled templates of its
//! document root. Both live in an immutable [`HostState`] snapshot behind
//! `RwLock<Arc<_>>`; a reload builds a fresh snapshot and swaps the pointer,
//! so requests already in flight finish with the snapshot they started with.
//!
//! A reload that fails takes the host out of service: [`Host::serve`] answers
//! [`Outcome::Unavailable`] until a later reload succeeds.
//!
//! Request handling never stores anything on the host. Everything specific to
//! one request travels in a [`RequestContext`] and the returned [`Outcome`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use lumen_config::{ConfigError, DocumentLayout, SITE_SETTINGS_FILENAME, SiteSettings};
use lumen_renderer::outline;
use percent_encoding::percent_decode_str;

use crate::loader::{load, load_fragment};
use crate::navigation::Navigation;
use crate::page::{Anchor, Page, RequestContext};
use crate::resolver::{is_safe, resolve};
use crate::templates::{TemplateError, TemplateHelpers, TemplateStore};

/// Host construction or reload error.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Cannot access document root {}: {source}", path.display())]
    DocumentRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Document root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error(transparent)]
    Templates(#[from] TemplateError),
}

/// Result of serving one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Serve this webroot file verbatim.
    Static(PathBuf),
    /// Permanent redirect to this location.
    Redirect(String),
    /// Rendered page HTML.
    Page(String),
    /// Nothing matched.
    NotFound,
    /// Template execution failed with this message.
    Error(String),
    /// The host failed to reload and is out of service.
    Unavailable,
}

/// Settings and templates of a host at one point in time.
#[derive(Debug)]
pub struct HostState {
    pub settings: Arc<SiteSettings>,
    pub templates: TemplateStore,
}

impl HostState {
    fn load(
        document_root: &Path,
        prefix: &str,
        previous: Option<&Self>,
    ) -> Result<Self, SiteError> {
        let settings = Arc::new(SiteSettings::load(document_root)?);
        let helpers = TemplateHelpers::new(prefix, Arc::clone(&settings));
        let templates_dir = document_root.join(&settings.document.templates);

        let templates = match previous {
            Some(previous) if previous.templates.dir() == templates_dir => {
                previous.templates.refresh(&helpers)?
            }
            _ => TemplateStore::load(&templates_dir, &helpers)?,
        };

        Ok(Self {
            settings,
            templates,
        })
    }
}

/// Last good state, plus the error of the latest reload if it failed.
#[derive(Debug, Clone)]
struct Loaded {
    state: Arc<HostState>,
    failure: Option<Arc<str>>,
}

/// A configured virtual host.
///
/// # Thread Safety
///
/// Readers take a clone of the current snapshot and drop the lock
/// immediately. Reloads are serialized by `reload_lock`.
#[derive(Debug)]
pub struct Host {
    name: String,
    prefix: String,
    document_root: PathBuf,
    loaded: RwLock<Loaded>,
    reload_lock: Mutex<()>,
}

impl Host {
    /// Load the host registered under `name` from `document_root`.
    ///
    /// # Errors
    ///
    /// Fails when the document root is missing or not a directory, when
    /// `site.yaml` is missing or invalid, or when `index.tpl` cannot be
    /// loaded.
    pub fn new(name: impl Into<String>, document_root: &Path) -> Result<Self, SiteError> {
        let name = name.into();
        let root_error = |source| SiteError::DocumentRoot {
            path: document_root.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(document_root).map_err(root_error)?;
        if !metadata.is_dir() {
            return Err(SiteError::NotADirectory(document_root.to_path_buf()));
        }
        let document_root = std::path::absolute(document_root).map_err(root_error)?;

        let prefix = host_prefix(&name);
        let state = HostState::load(&document_root, &prefix, None)?;
        tracing::info!(host = %name, root = %document_root.display(), "Host loaded");

        Ok(Self {
            name,
            prefix,
            document_root,
            loaded: RwLock::new(Loaded {
                state: Arc::new(state),
                failure: None,
            }),
            reload_lock: Mutex::new(()),
        })
    }

    /// Host key this host was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL path prefix (`/blog` for `example.com/blog`, empty otherwise).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    fn loaded(&self) -> Loaded {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last successfully loaded settings and templates.
    #[must_use]
    pub fn state(&self) -> Arc<HostState> {
        self.loaded().state
    }

    /// Error of the latest reload, while the host is out of service.
    #[must_use]
    pub fn failure(&self) -> Option<Arc<str>> {
        self.loaded().failure
    }

    /// Re-read `site.yaml` and refresh templates.
    ///
    /// On failure the host stops serving pages until a later reload
    /// succeeds. The last good snapshot is kept as the base for that reload.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Host::new`], minus the document root checks.
    pub fn reload(&self) -> Result<(), SiteError> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.state();
        let result = HostState::load(&self.document_root, &self.prefix, Some(&current));

        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(next) => {
                let recovered = loaded.failure.take().is_some();
                loaded.state = Arc::new(next);
                tracing::info!(host = %self.name, recovered, "Host reloaded");
                Ok(())
            }
            Err(e) => {
                loaded.failure = Some(e.to_string().into());
                Err(e)
            }
        }
    }

    /// Files whose changes should trigger [`Host::reload`].
    #[must_use]
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let state = self.state();
        let mut paths = vec![
            self.document_root.join(SITE_SETTINGS_FILENAME),
            state.templates.dir().to_path_buf(),
        ];
        paths.extend(state.templates.paths().map(Path::to_path_buf));
        paths
    }

    /// Files to watch for a document root whose host could not be loaded.
    ///
    /// The templates directory comes from `site.yaml` when it still parses.
    #[must_use]
    pub fn pending_watch_paths(document_root: &Path) -> Vec<PathBuf> {
        let templates = SiteSettings::load(document_root)
            .map(|settings| settings.document.templates)
            .unwrap_or_else(|_| DocumentLayout::default().templates);
        vec![
            document_root.join(SITE_SETTINGS_FILENAME),
            document_root.join(templates),
        ]
    }

    /// Serve one request.
    #[must_use]
    pub fn serve(&self, ctx: &RequestContext) -> Outcome {
        let Loaded { state, failure } = self.loaded();
        if failure.is_some() {
            return Outcome::Unavailable;
        }
        let layout = &state.settings.document;

        let raw = ctx.path.strip_prefix(&self.prefix).unwrap_or(&ctx.path);
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        let relative = decoded.trim_matches('/');
        if !is_safe(relative) {
            return Outcome::NotFound;
        }

        if !relative.is_empty() {
            let asset = self.document_root.join(&layout.webroot).join(relative);
            if asset.is_file() {
                return Outcome::Static(asset);
            }
        }

        let content_root = self.document_root.join(&layout.markdown);
        let Some(resolved) = resolve(&content_root, relative) else {
            return Outcome::NotFound;
        };

        if resolved.dir_match && !ctx.has_trailing_slash() {
            return Outcome::Redirect(format!("{}/", ctx.path));
        }
        if !resolved.dir_match && ctx.has_trailing_slash() {
            return Outcome::Redirect(ctx.path.trim_end_matches('/').to_owned());
        }

        let html = match load(&resolved.path) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(path = %resolved.path.display(), error = %e, "Failed to read content");
                return Outcome::NotFound;
            }
        };
        let outline = outline(&html);

        let file_dir = resolved.file_dir();
        let base_path = base_path(&content_root, file_dir);
        let nav = Navigation::build(&self.prefix, file_dir, &base_path);

        let mut toc: BTreeMap<u8, Vec<Anchor>> = BTreeMap::new();
        for entry in outline.toc {
            toc.entry(entry.level)
                .or_default()
                .push(Anchor::new(entry.title, format!("#{}", entry.id)));
        }

        let page = Page {
            title: outline.title.unwrap_or_default(),
            content: outline.html,
            content_header: load_fragment(file_dir, "_header"),
            content_footer: load_fragment(file_dir, "_footer"),
            menu: nav.menu,
            side_menu: nav.side_menu,
            breadcrumb: nav.breadcrumb,
            current_page: nav.current_page,
            file_path: resolved.path.display().to_string(),
            file_dir: format!("{}{MAIN_SEPARATOR}", file_dir.display()),
            is_home: base_path == "/",
            base_path,
            toc,
        };

        match state.templates.render(&page) {
            Ok(html) => Outcome::Page(html),
            Err(e) => {
                tracing::error!(host = %self.name, path = %ctx.path, error = %e, "Render failed");
                Outcome::Error(e.to_string())
            }
        }
    }
}

/// Path part of a host key: `example.com/blog/` gives `/blog`.
fn host_prefix(name: &str) -> String {
    name.find('/')
        .map(|idx| name[idx..].trim_end_matches('/').to_owned())
        .unwrap_or_default()
}

/// Logical directory of `dir` below `content_root`: `/` or `/a/b/`.
fn base_path(content_root: &Path, dir: &Path) -> String {
    let segments: Vec<String> = dir
        .strip_prefix(content_root)
        .map(|rel| {
            rel.components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}/", segments.join("/"))
    }
}
