//! Per-host template store.
//!
//! Templates are `*.tpl` files rendered with minijinja. The store remembers
//! the mtime each template was compiled from and only recompiles files whose
//! mtime changed. Refreshing never mutates a store in place: it returns a new
//! store sharing the unchanged compiled templates, so readers holding the old
//! store are unaffected.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;

use lumen_config::SiteSettings;
use lumen_renderer::escape_html;
use minijinja::{AutoEscape, Environment, Value, context};
use regex::Regex;

use crate::page::Page;

/// Suffix of template files.
pub const TEMPLATE_SUFFIX: &str = ".tpl";

/// Template every page is rendered through.
pub const INDEX_TEMPLATE: &str = "index.tpl";

static EXTERNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+://").expect("external link pattern is valid"));

/// Template store error.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Templates directory could not be read.
    #[error("Cannot read templates directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// No usable `index.tpl` after loading.
    #[error("Template {} could not be found", .0.display())]
    MissingIndex(PathBuf),
}

/// Whether `url` carries a scheme (`https://`, `ftp://`, ...).
#[must_use]
pub fn is_external(url: &str) -> bool {
    EXTERNAL_RE.is_match(url)
}

/// Functions a host exposes to its templates.
#[derive(Clone, Debug)]
pub struct TemplateHelpers {
    prefix: String,
    settings: Arc<SiteSettings>,
}

impl TemplateHelpers {
    pub fn new(prefix: impl Into<String>, settings: Arc<SiteSettings>) -> Self {
        Self {
            prefix: prefix.into(),
            settings,
        }
    }

    /// Root a site-relative URL at the host prefix.
    ///
    /// External URLs and URLs already under the prefix (navigation anchors)
    /// are returned unchanged, so `url(url(x)) == url(x)`.
    #[must_use]
    pub fn url(&self, target: &str) -> String {
        if is_external(target) || self.is_prefixed(target) {
            target.to_owned()
        } else {
            self.asset(target)
        }
    }

    fn is_prefixed(&self, target: &str) -> bool {
        !self.prefix.is_empty()
            && target
                .strip_prefix(&self.prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// URL of a static file under the host prefix.
    #[must_use]
    pub fn asset(&self, path: &str) -> String {
        format!("{}/{}", self.prefix, path.trim_start_matches('/'))
    }

    /// Value at a slash-separated settings path, undefined when missing.
    #[must_use]
    pub fn setting(&self, path: &str) -> Value {
        self.settings
            .get(path)
            .map_or(Value::UNDEFINED, Value::from_serialize)
    }

    /// List at a slash-separated settings path, empty when missing.
    #[must_use]
    pub fn settings(&self, path: &str) -> Value {
        let items: Vec<Value> = self
            .settings
            .get_list(path)
            .unwrap_or_default()
            .iter()
            .map(Value::from_serialize)
            .collect();
        Value::from(items)
    }

    /// `<a>` element for `url`; external links open in a new tab.
    #[must_use]
    pub fn link(&self, url: &str, text: &str) -> Value {
        let href = escape_html(&self.url(url));
        let text = escape_html(text);
        let html = if is_external(url) {
            format!(r#"<a target="_blank" href="{href}">{text}</a>"#)
        } else {
            format!(r#"<a href="{href}">{text}</a>"#)
        };
        Value::from_safe_string(html)
    }

    fn register(&self, env: &mut Environment<'static>) {
        let helpers = self.clone();
        env.add_function("url", move |target: String| href(&helpers.url(&target)));
        let helpers = self.clone();
        env.add_function("asset", move |path: String| href(&helpers.asset(&path)));
        let helpers = self.clone();
        env.add_function("setting", move |path: String| helpers.setting(&path));
        let helpers = self.clone();
        env.add_function("settings", move |path: String| helpers.settings(&path));
        let helpers = self.clone();
        env.add_function("link", move |url: String, text: String| {
            helpers.link(&url, &text)
        });
        env.add_function("is_external", |url: String| is_external(&url));
        env.add_function("htmltext", Value::from_safe_string);
        env.add_function("jstext", Value::from_safe_string);
    }
}

/// Attribute-safe URL. The auto-escaper would otherwise turn `/` into `&#x2f;`.
fn href(url: &str) -> Value {
    Value::from_safe_string(escape_html(url))
}

#[derive(Clone, Debug)]
struct TemplateEntry {
    path: PathBuf,
    mtime: SystemTime,
}

/// Compiled templates of one host.
#[derive(Clone)]
pub struct TemplateStore {
    dir: PathBuf,
    entries: BTreeMap<String, TemplateEntry>,
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("dir", &self.dir)
            .field("templates", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TemplateStore {
    /// Load every template in `dir`.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be read or `index.tpl` is missing or
    /// does not compile.
    pub fn load(dir: &Path, helpers: &TemplateHelpers) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        let empty = Self {
            dir: dir.to_path_buf(),
            entries: BTreeMap::new(),
            env,
        };
        empty.refresh(helpers)
    }

    /// Produce an updated store.
    ///
    /// Templates with an unchanged mtime are kept as compiled. New or changed
    /// templates are compiled; a template that fails to compile is logged and
    /// its previous version, if any, stays in place. Templates whose file
    /// disappeared are dropped.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TemplateStore::load`].
    pub fn refresh(&self, helpers: &TemplateHelpers) -> Result<Self, TemplateError> {
        let files = scan(&self.dir)?;
        let mut next = self.clone();
        helpers.register(&mut next.env);

        for name in self.entries.keys() {
            if !files.contains_key(name) {
                tracing::info!(template = %name, "Template removed");
                next.entries.remove(name);
                next.env.remove_template(name);
            }
        }

        for (name, current) in files {
            match self.entries.get(&name) {
                Some(entry) if entry.mtime == current.mtime => continue,
                Some(_) => tracing::info!(template = %current.path.display(), "Reloading template"),
                None => tracing::info!(template = %current.path.display(), "Loading template"),
            }

            let source = match fs::read_to_string(&current.path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(template = %current.path.display(), error = %e, "Failed to read template");
                    continue;
                }
            };
            match next.env.add_template_owned(name.clone(), source) {
                Ok(()) => {
                    next.entries.insert(name, current);
                }
                Err(e) => {
                    tracing::error!(template = %current.path.display(), error = %e, "Template error");
                }
            }
        }

        if !next.entries.contains_key(INDEX_TEMPLATE) {
            return Err(TemplateError::MissingIndex(self.dir.join(INDEX_TEMPLATE)));
        }
        Ok(next)
    }

    /// Render `page` through `index.tpl`.
    pub fn render(&self, page: &Page) -> Result<String, minijinja::Error> {
        let template = self.env.get_template(INDEX_TEMPLATE)?;
        template.render(page_context(page))
    }

    /// Templates directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of the loaded template files.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.values().map(|entry| entry.path.as_path())
    }
}

/// `*.tpl` files in `dir` with their mtimes.
fn scan(dir: &Path) -> Result<BTreeMap<String, TemplateEntry>, TemplateError> {
    let io_error = |source| TemplateError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !name.ends_with(TEMPLATE_SUFFIX) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.insert(
            name,
            TemplateEntry {
                path: entry.path(),
                mtime,
            },
        );
    }
    Ok(files)
}

/// Template context. HTML fragments are marked safe so autoescaping leaves
/// them intact.
fn page_context(page: &Page) -> Value {
    context! {
        title => &page.title,
        content => Value::from_safe_string(page.content.clone()),
        content_header => Value::from_safe_string(page.content_header.clone()),
        content_footer => Value::from_safe_string(page.content_footer.clone()),
        menu => &page.menu,
        side_menu => &page.side_menu,
        breadcrumb => &page.breadcrumb,
        current_page => &page.current_page,
        file_path => &page.file_path,
        file_dir => &page.file_dir,
        base_path => &page.base_path,
        is_home => page.is_home,
        toc => &page.toc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Anchor;
    use pretty_assertions::assert_eq;

    fn helpers(prefix: &str) -> TemplateHelpers {
        let settings = SiteSettings::from_yaml(
            "page:\n  brand: Lumen\nlinks:\n  - text: Src\n    url: https://example.com\n",
        )
        .unwrap();
        TemplateHelpers::new(prefix, Arc::new(settings))
    }

    fn write_template(dir: &Path, name: &str, source: &str) {
        fs::write(dir.join(name), source).unwrap();
    }

    fn set_mtime(path: &Path, mtime: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("https://example.com"));
        assert!(is_external("ftp://files.example.com/x"));
        assert!(!is_external("/about"));
        assert!(!is_external("about"));
        assert!(!is_external("mailto:me@example.com"));
    }

    #[test]
    fn test_url_helper() {
        let h = helpers("/blog");
        assert_eq!(h.url("css/site.css"), "/blog/css/site.css");
        assert_eq!(h.url("/about"), "/blog/about");
        assert_eq!(h.url("https://example.com"), "https://example.com");
        assert_eq!(helpers("").url("about"), "/about");
    }

    #[test]
    fn test_url_helper_keeps_prefixed_urls() {
        let h = helpers("/blog");
        assert_eq!(h.url("/blog/2024/"), "/blog/2024/");
        assert_eq!(h.url("/blog"), "/blog");
        assert_eq!(h.url("/blogroll"), "/blog/blogroll");
        assert_eq!(h.url(&h.url("a/b")), "/blog/a/b");
    }

    #[test]
    fn test_link_helper() {
        let h = helpers("");
        assert_eq!(
            h.link("/about", "About").to_string(),
            r#"<a href="/about">About</a>"#
        );
        assert_eq!(
            h.link("https://example.com", "Ext").to_string(),
            r#"<a target="_blank" href="https://example.com">Ext</a>"#
        );
    }

    #[test]
    fn test_setting_helpers() {
        let h = helpers("");
        assert_eq!(h.setting("page/brand").to_string(), "Lumen");
        assert!(h.setting("page/missing").is_undefined());
        assert_eq!(h.settings("links").len(), Some(1));
        assert_eq!(h.settings("missing").len(), Some(0));
    }

    #[test]
    fn test_missing_index_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "other.tpl", "x");

        let err = TemplateStore::load(dir.path(), &helpers("")).unwrap_err();
        assert!(matches!(err, TemplateError::MissingIndex(_)));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateStore::load(&dir.path().join("nope"), &helpers("")).unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
    }

    #[test]
    fn test_only_tpl_files_loaded() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "index.tpl", "{{ title }}");
        write_template(dir.path(), "nav.tpl", "nav");
        write_template(dir.path(), "notes.txt", "ignored");

        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();
        assert_eq!(store.entries.keys().collect::<Vec<_>>(), vec!["index.tpl", "nav.tpl"]);
    }

    #[test]
    fn test_render_page_context() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "index.tpl",
            "<title>{{ title }}</title>{{ content }}\
             {% for item in menu %}[{{ item.text }}]({{ url(item.url) }}){% endfor %}\
             {% if is_home %}home{% endif %}",
        );
        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();
        let page = Page {
            title: "A & B".to_owned(),
            content: "<p>body</p>".to_owned(),
            menu: vec![Anchor::new("Docs", "/docs/")],
            is_home: true,
            ..Page::default()
        };

        assert_eq!(
            store.render(&page).unwrap(),
            "<title>A &amp; B</title><p>body</p>[Docs](/docs/)home"
        );
    }

    #[test]
    fn test_render_helpers_and_includes() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "index.tpl",
            r#"{% include "nav.tpl" %}|{{ setting("page/brand") }}|{{ htmltext("<b>x</b>") }}"#,
        );
        write_template(dir.path(), "nav.tpl", r#"{{ link("/about", "About") }}"#);

        let store = TemplateStore::load(dir.path(), &helpers("/site")).unwrap();

        assert_eq!(
            store.render(&Page::default()).unwrap(),
            r#"<a href="/site/about">About</a>|Lumen|<b>x</b>"#
        );
    }

    #[test]
    fn test_url_functions_keep_slashes() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "index.tpl",
            r#"<a href="{{ url('/docs/') }}"><img src="{{ asset('img/a b.png') }}"></a>{{ url('/q?a="1"') }}"#,
        );
        let store = TemplateStore::load(dir.path(), &helpers("/site")).unwrap();

        assert_eq!(
            store.render(&Page::default()).unwrap(),
            r#"<a href="/site/docs/"><img src="/site/img/a b.png"></a>/site/q?a=&quot;1&quot;"#
        );
    }

    #[test]
    fn test_plain_values_still_escaped() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "index.tpl", "{{ base_path }}");
        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();
        let page = Page {
            base_path: "/a/".to_owned(),
            ..Page::default()
        };

        assert_eq!(store.render(&page).unwrap(), "&#x2f;a&#x2f;");
    }

    #[test]
    fn test_render_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "index.tpl", r#"{% include "missing.tpl" %}"#);
        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();
        assert!(store.render(&Page::default()).is_err());
    }

    #[test]
    fn test_unchanged_mtime_is_not_recompiled() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.tpl");
        write_template(dir.path(), "index.tpl", "v1");
        let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        set_mtime(&index, mtime);

        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();
        write_template(dir.path(), "index.tpl", "v2");
        set_mtime(&index, mtime);

        let refreshed = store.refresh(&helpers("")).unwrap();
        assert_eq!(refreshed.render(&Page::default()).unwrap(), "v1");
    }

    #[test]
    fn test_changed_mtime_is_recompiled() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.tpl");
        write_template(dir.path(), "index.tpl", "v1");
        set_mtime(&index, SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1));

        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();
        write_template(dir.path(), "index.tpl", "v2");
        set_mtime(&index, SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(2));

        let refreshed = store.refresh(&helpers("")).unwrap();
        assert_eq!(refreshed.render(&Page::default()).unwrap(), "v2");
        // The previous store is untouched.
        assert_eq!(store.render(&Page::default()).unwrap(), "v1");
    }

    #[test]
    fn test_compile_error_keeps_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.tpl");
        write_template(dir.path(), "index.tpl", "good");
        set_mtime(&index, SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1));
        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();

        write_template(dir.path(), "index.tpl", "{% if %}");
        set_mtime(&index, SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(2));

        let refreshed = store.refresh(&helpers("")).unwrap();
        assert_eq!(refreshed.render(&Page::default()).unwrap(), "good");
    }

    #[test]
    fn test_broken_index_on_first_load_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "index.tpl", "{% for %}");
        let err = TemplateStore::load(dir.path(), &helpers("")).unwrap_err();
        assert!(matches!(err, TemplateError::MissingIndex(_)));
    }

    #[test]
    fn test_removed_template_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "index.tpl", "i");
        write_template(dir.path(), "old.tpl", "o");
        let store = TemplateStore::load(dir.path(), &helpers("")).unwrap();

        fs::remove_file(dir.path().join("old.tpl")).unwrap();
        let refreshed = store.refresh(&helpers("")).unwrap();

        assert_eq!(refreshed.entries.keys().collect::<Vec<_>>(), vec!["index.tpl"]);
    }

    #[test]
    fn test_refresh_rebinds_helpers() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "index.tpl", r#"{{ url("x") }}"#);
        let store = TemplateStore::load(dir.path(), &helpers("/old")).unwrap();

        let refreshed = store.refresh(&helpers("/new")).unwrap();

        assert_eq!(refreshed.render(&Page::default()).unwrap(), "/new/x");
    }
}
