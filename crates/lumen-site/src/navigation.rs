//! Navigation derived from directory listings.
//!
//! Nothing is cached: every request lists the directories it needs, so new
//! or deleted content shows up immediately.

use std::fs;
use std::path::Path;

use crate::page::Anchor;
use crate::resolver::CONTENT_EXTENSIONS;

/// Breadcrumb, menus and current page for one directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Navigation {
    pub breadcrumb: Vec<Anchor>,
    pub current_page: Anchor,
    pub menu: Vec<Anchor>,
    pub side_menu: Vec<Anchor>,
}

impl Navigation {
    /// Build navigation for the directory `file_dir`, whose logical path is
    /// `base_path` (`/` or `/a/b/`). All URLs are prefixed with `prefix`.
    #[must_use]
    pub fn build(prefix: &str, file_dir: &Path, base_path: &str) -> Self {
        let breadcrumb = breadcrumb(prefix, base_path);
        let current_page = breadcrumb.last().cloned().unwrap_or_default();
        Self {
            breadcrumb,
            current_page,
            menu: menu(prefix, file_dir, base_path),
            side_menu: side_menu(prefix, file_dir, base_path),
        }
    }
}

/// Strip a content extension (`.md`, `.html`, `.txt`) from a file name.
#[must_use]
pub fn strip_known_extension(name: &str) -> &str {
    CONTENT_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}

/// Turn a slug into a display title: `-` and `_` become spaces and the first
/// letter is capitalized.
#[must_use]
pub fn title_from_slug(slug: &str) -> String {
    let spaced = slug.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Display title of a file or directory name.
#[must_use]
pub fn title_from_name(name: &str) -> String {
    title_from_slug(strip_known_extension(name))
}

/// `Home` followed by one anchor per segment of `base_path`.
#[must_use]
pub fn breadcrumb(prefix: &str, base_path: &str) -> Vec<Anchor> {
    let mut trail = vec![Anchor::new("Home", format!("{prefix}/"))];
    let mut url = prefix.to_owned();
    for segment in base_path.split('/').filter(|s| !s.is_empty()) {
        url.push('/');
        url.push_str(segment);
        trail.push(Anchor::new(title_from_slug(segment), url.clone()));
    }
    trail
}

/// Subdirectories of `dir`, each with its own subdirectories as children.
#[must_use]
pub fn menu(prefix: &str, dir: &Path, base_path: &str) -> Vec<Anchor> {
    list(dir, true)
        .into_iter()
        .map(|entry| {
            let url = format!("{prefix}{base_path}{}/", entry.name);
            let children = list(&dir.join(&entry.name), true)
                .into_iter()
                .map(|child| Anchor::new(title_from_name(&child.name), format!("{url}{}/", child.name)))
                .collect();
            Anchor {
                text: title_from_name(&entry.name),
                url,
                children,
            }
        })
        .collect()
}

/// Entries of `dir` except index pages, falling back to the parent
/// directory when nothing is left and `dir` is not the site root.
#[must_use]
pub fn side_menu(prefix: &str, dir: &Path, base_path: &str) -> Vec<Anchor> {
    let items = listing(prefix, dir, base_path);
    if !items.is_empty() {
        return items;
    }
    match (dir.parent(), parent_base_path(base_path)) {
        (Some(parent), Some(parent_base)) => listing(prefix, parent, &parent_base),
        _ => items,
    }
}

fn listing(prefix: &str, dir: &Path, base_path: &str) -> Vec<Anchor> {
    list(dir, false)
        .into_iter()
        .filter_map(|entry| {
            let text = title_from_name(&entry.name);
            if text.eq_ignore_ascii_case("index") {
                return None;
            }
            let url = if entry.is_dir {
                format!("{prefix}{base_path}{}/", entry.name)
            } else {
                format!("{prefix}{base_path}{}", strip_known_extension(&entry.name))
            };
            Some(Anchor::new(text, url))
        })
        .collect()
}

/// `/a/b/` becomes `/a/`; the root has no parent.
fn parent_base_path(base_path: &str) -> Option<String> {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(match trimmed.rfind('/') {
        Some(idx) => format!("/{}/", &trimmed[..idx]),
        None => "/".to_owned(),
    })
}

struct Entry {
    name: String,
    is_dir: bool,
}

/// Visible entries of `dir`, sorted by name. Names starting with `.` or `_`
/// are hidden.
fn list(dir: &Path, dirs_only: bool) -> Vec<Entry> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to list directory");
            return Vec::new();
        }
    };

    let mut visible: Vec<Entry> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_owned();
            if name.starts_with('.') || name.starts_with('_') {
                return None;
            }
            // Follows symlinks, so linked directories are listed as directories.
            let is_dir = entry.path().is_dir();
            (is_dir || !dirs_only).then_some(Entry { name, is_dir })
        })
        .collect();
    visible.sort_by(|a, b| a.name.cmp(&b.name));
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            if file.ends_with('/') {
                fs::create_dir_all(&path).unwrap();
            } else {
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, "x").unwrap();
            }
        }
        dir
    }

    fn pairs(anchors: &[Anchor]) -> Vec<(&str, &str)> {
        anchors
            .iter()
            .map(|a| (a.text.as_str(), a.url.as_str()))
            .collect()
    }

    #[test]
    fn test_title_from_name() {
        assert_eq!(title_from_name("getting-started.md"), "Getting started");
        assert_eq!(title_from_name("my_page.html"), "My page");
        assert_eq!(title_from_name("notes.txt"), "Notes");
        assert_eq!(title_from_name("archive.tar"), "Archive.tar");
        assert_eq!(title_from_name("über"), "Über");
        assert_eq!(title_from_name(""), "");
    }

    #[test]
    fn test_strip_known_extension() {
        assert_eq!(strip_known_extension("page.md"), "page");
        assert_eq!(strip_known_extension("page.html"), "page");
        assert_eq!(strip_known_extension("image.png"), "image.png");
        assert_eq!(strip_known_extension(".md"), ".md");
    }

    #[test]
    fn test_breadcrumb() {
        let trail = breadcrumb("", "/a/b/c/");
        assert_eq!(
            pairs(&trail),
            vec![("Home", "/"), ("A", "/a"), ("B", "/a/b"), ("C", "/a/b/c")]
        );
    }

    #[test]
    fn test_breadcrumb_root_and_prefix() {
        assert_eq!(pairs(&breadcrumb("", "/")), vec![("Home", "/")]);
        assert_eq!(
            pairs(&breadcrumb("/blog", "/2024/first-post/")),
            vec![
                ("Home", "/blog/"),
                ("2024", "/blog/2024"),
                ("First post", "/blog/2024/first-post")
            ]
        );
    }

    #[test]
    fn test_current_page_is_last_crumb() {
        let dir = tree(&["a/"]);
        let nav = Navigation::build("", &dir.path().join("a"), "/a/");
        assert_eq!(nav.current_page, Anchor::new("A", "/a"));

        let home = Navigation::build("", dir.path(), "/");
        assert_eq!(home.current_page, Anchor::new("Home", "/"));
    }

    #[test]
    fn test_menu_lists_directories_with_children() {
        let dir = tree(&[
            "index.md",
            "docs/install/",
            "docs/usage/",
            "docs/_drafts/",
            "about/",
            ".git/",
            "_private/",
            "zeta.md",
        ]);

        let menu = menu("", dir.path(), "/");

        assert_eq!(pairs(&menu), vec![("About", "/about/"), ("Docs", "/docs/")]);
        assert!(menu[0].children.is_empty());
        assert_eq!(
            pairs(&menu[1].children),
            vec![("Install", "/docs/install/"), ("Usage", "/docs/usage/")]
        );
    }

    #[test]
    fn test_side_menu_lists_files_and_directories() {
        let dir = tree(&[
            "guide/index.md",
            "guide/setup.md",
            "guide/faq.html",
            "guide/advanced/",
            "guide/_header.md",
            "guide/.hidden.md",
        ]);

        let side = side_menu("/docs", &dir.path().join("guide"), "/guide/");

        assert_eq!(
            pairs(&side),
            vec![
                ("Advanced", "/docs/guide/advanced/"),
                ("Faq", "/docs/guide/faq"),
                ("Setup", "/docs/guide/setup"),
            ]
        );
    }

    #[test]
    fn test_side_menu_falls_back_to_parent() {
        let dir = tree(&["index.md", "a/b/index.md", "a/x.md", "a/y.md"]);

        let side = side_menu("", &dir.path().join("a/b"), "/a/b/");

        assert_eq!(
            pairs(&side),
            vec![("B", "/a/b/"), ("X", "/a/x"), ("Y", "/a/y")]
        );
    }

    #[test]
    fn test_side_menu_root_does_not_fall_back() {
        let dir = tree(&["site/index.md", "sibling.md"]);
        let side = side_menu("", &dir.path().join("site"), "/");
        assert!(side.is_empty());
    }

    #[test]
    fn test_parent_base_path() {
        assert_eq!(parent_base_path("/a/b/"), Some("/a/".to_owned()));
        assert_eq!(parent_base_path("/a/"), Some("/".to_owned()));
        assert_eq!(parent_base_path("/"), None);
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(menu("", &dir.path().join("gone"), "/").is_empty());
    }
}
