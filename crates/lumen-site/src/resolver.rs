//! Mapping of logical request paths to files on disk.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensions tried, in order, when a requested name does not exist.
pub const CONTENT_EXTENSIONS: [&str; 3] = [".md", ".html", ".txt"];

/// Name looked up inside a requested directory.
const INDEX_NAME: &str = "index";

/// A successfully resolved request path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// File (or directory, when it has no index) to serve.
    pub path: PathBuf,
    /// Whether the requested path named a directory.
    ///
    /// True both when the directory's index was found and when the directory
    /// itself is the match.
    pub dir_match: bool,
}

impl Resolved {
    /// Directory whose listing drives navigation.
    #[must_use]
    pub fn file_dir(&self) -> &Path {
        if self.path.is_dir() {
            &self.path
        } else {
            self.path.parent().unwrap_or(&self.path)
        }
    }
}

/// Resolve `logical` (slash-separated, relative to `content_root`).
///
/// - an existing directory is searched for `index` (with the same rules);
///   without one, the directory itself is returned;
/// - an existing file is returned as is;
/// - a missing name is retried with each of [`CONTENT_EXTENSIONS`].
///
/// An empty path resolves against `content_root` itself. Paths with `..`
/// components never resolve.
#[must_use]
pub fn resolve(content_root: &Path, logical: &str) -> Option<Resolved> {
    let relative = logical.trim_matches('/');
    if !is_safe(relative) {
        return None;
    }
    let candidate = if relative.is_empty() {
        content_root.to_path_buf()
    } else {
        content_root.join(relative)
    };

    let dir_match = candidate.is_dir();
    guess(&candidate, true).map(|path| Resolved { path, dir_match })
}

/// Whether a relative path stays below its root.
#[must_use]
pub fn is_safe(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn guess(candidate: &Path, descend: bool) -> Option<PathBuf> {
    match fs::metadata(candidate) {
        Ok(meta) if meta.is_dir() && descend => {
            guess(&candidate.join(INDEX_NAME), true).or_else(|| Some(candidate.to_path_buf()))
        }
        Ok(_) => Some(candidate.to_path_buf()),
        Err(_) if descend => CONTENT_EXTENSIONS
            .iter()
            .find_map(|ext| guess(&with_suffix(candidate, ext), false)),
        Err(_) => None,
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
