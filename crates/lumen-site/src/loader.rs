//! Reading resolved content.

use std::fs;
use std::io;
use std::path::Path;

use lumen_renderer::markdown_to_html;

use crate::resolver::resolve;

/// Read a resolved file as HTML.
///
/// `.md` files are converted from Markdown; anything else is returned as is
/// and treated as trusted HTML. A directory yields empty content.
pub fn load(path: &Path) -> io::Result<String> {
    if path.is_dir() {
        return Ok(String::new());
    }
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    if path.extension().is_some_and(|ext| ext == "md") {
        Ok(markdown_to_html(&text))
    } else {
        Ok(text.into_owned())
    }
}

/// Load a fragment such as `_header` or `_footer` from `dir`.
///
/// The name is resolved with the usual extension rules. A missing or
/// unreadable fragment yields an empty string.
pub fn load_fragment(dir: &Path, name: &str) -> String {
    let Some(resolved) = resolve(dir, name) else {
        return String::new();
    };
    if resolved.path.is_dir() {
        return String::new();
    }
    load(&resolved.path).unwrap_or_else(|e| {
        tracing::warn!(path = %resolved.path.display(), error = %e, "Failed to read fragment");
        String::new()
    })
}
