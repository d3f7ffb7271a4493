//! Page model handed to templates.

use std::collections::BTreeMap;

use serde::Serialize;

/// Navigation link.
///
/// URLs include the host's path prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Anchor {
    /// Display text.
    pub text: String,
    /// Link target.
    pub url: String,
    /// Nested links (top menu only, one level deep).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Anchor>,
}

impl Anchor {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }
}

/// Everything a template needs to render one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Text of the first heading in the content.
    pub title: String,
    /// Rendered content HTML.
    pub content: String,
    /// Rendered `_header` fragment.
    pub content_header: String,
    /// Rendered `_footer` fragment.
    pub content_footer: String,
    /// Subdirectories of the current directory.
    pub menu: Vec<Anchor>,
    /// Entries of the current directory, or of its parent when empty.
    pub side_menu: Vec<Anchor>,
    /// Trail from the site root to the current directory.
    pub breadcrumb: Vec<Anchor>,
    /// Last breadcrumb entry.
    pub current_page: Anchor,
    /// Filesystem path of the served file.
    pub file_path: String,
    /// Filesystem directory of the served file, with a trailing separator.
    pub file_dir: String,
    /// Logical directory of the served file, `/` for the site root.
    pub base_path: String,
    /// Whether the page lives in the site root directory.
    pub is_home: bool,
    /// Headings grouped by level, each linking to its anchor id.
    pub toc: BTreeMap<u8, Vec<Anchor>>,
}

/// Per-request input threaded through the rendering pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Raw (percent-encoded) URL path, including any host prefix.
    pub path: String,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Whether the request path ends with a slash.
    #[must_use]
    pub fn has_trailing_slash(&self) -> bool {
        self.path.ends_with('/')
    }
}
