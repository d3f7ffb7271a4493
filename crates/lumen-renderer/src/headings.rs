//! Heading post-processing of rendered HTML.
//!
//! Headings are matched on the HTML output rather than on parser events so
//! that `.html` and `.txt` content gets the same treatment as Markdown.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::util::{slugify, unescape_html};

/// Attribute-less `<h1>`..`<h6>` elements. Headings that already carry
/// attributes are left alone.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<h([1-6])>(.*?)</h[1-6]>").expect("heading pattern is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Table of contents entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    /// Heading level (1-6).
    pub level: u8,
    /// Heading text with markup removed.
    pub title: String,
    /// Anchor ID for linking.
    pub id: String,
}

/// Result of [`outline`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outline {
    /// HTML with every heading rewritten to carry an id and self-link.
    pub html: String,
    /// Text of the first heading, if any.
    pub title: Option<String>,
    /// Headings in document order.
    pub toc: Vec<TocEntry>,
}

/// Extract the title and table of contents from an HTML fragment.
///
/// Each heading becomes `<hN id="slug"><a href="#slug">text</a></hN>`. When
/// the slug is empty or already taken, the id falls back to the zero-padded
/// heading level (`00002` for `<h2>`). Two such fallbacks at the same level
/// produce the same id.
#[must_use]
pub fn outline(html: &str) -> Outline {
    let mut title: Option<String> = None;
    let mut toc = Vec::new();
    let mut used = HashSet::new();

    let rewritten = HEADING_RE.replace_all(html, |caps: &Captures<'_>| {
        let level: u8 = caps[1].parse().unwrap_or(1);
        let inner = &caps[2];
        let text = unescape_html(TAG_RE.replace_all(inner, "").trim());

        if title.is_none() && !text.is_empty() {
            title = Some(text.clone());
        }

        let mut id = slugify(&text);
        if id.is_empty() || used.contains(&id) {
            id = format!("{level:05}");
        }
        used.insert(id.clone());

        let heading = format!(r##"<h{level} id="{id}"><a href="#{id}">{inner}</a></h{level}>"##);
        toc.push(TocEntry {
            level,
            title: text,
            id,
        });
        heading
    });

    Outline {
        html: rewritten.into_owned(),
        title,
        toc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown_to_html;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_title_and_anchor_from_markdown() {
        let result = outline(&markdown_to_html("# Title\n\nBody"));

        assert_eq!(result.title, Some("Title".to_owned()));
        assert!(
            result
                .html
                .contains(r##"<h1 id="title"><a href="#title">Title</a></h1>"##)
        );
    }

    #[test]
    fn test_first_heading_of_any_level_is_title() {
        let result = outline("<p>intro</p><h3>Deep</h3><h1>Top</h1>");
        assert_eq!(result.title, Some("Deep".to_owned()));
    }

    #[test]
    fn test_no_heading() {
        let result = outline("<p>Just text</p>");
        assert_eq!(result.title, None);
        assert!(result.toc.is_empty());
        assert_eq!(result.html, "<p>Just text</p>");
    }

    #[test]
    fn test_toc_in_document_order() {
        let result = outline("<h1>Guide</h1><h2>Install</h2><h3>Linux</h3><h2>Usage</h2>");

        assert_eq!(
            result.toc,
            vec![
                TocEntry {
                    level: 1,
                    title: "Guide".to_owned(),
                    id: "guide".to_owned()
                },
                TocEntry {
                    level: 2,
                    title: "Install".to_owned(),
                    id: "install".to_owned()
                },
                TocEntry {
                    level: 3,
                    title: "Linux".to_owned(),
                    id: "linux".to_owned()
                },
                TocEntry {
                    level: 2,
                    title: "Usage".to_owned(),
                    id: "usage".to_owned()
                },
            ]
        );
    }

    #[test]
    fn test_inline_markup_stripped_from_title() {
        let result = outline("<h2>Hello <em>big</em> &amp; bold</h2>");

        assert_eq!(result.title, Some("Hello big & bold".to_owned()));
        assert_eq!(result.toc[0].id, "hello-big-bold");
        assert!(result.html.contains(r##"<a href="#hello-big-bold">Hello <em>big</em> &amp; bold</a>"##));
    }

    #[test]
    fn test_duplicate_slug_falls_back_to_level() {
        let result = outline("<h2>Notes</h2><h2>Notes</h2>");

        assert_eq!(result.toc[0].id, "notes");
        assert_eq!(result.toc[1].id, "00002");
    }

    #[test]
    fn test_empty_slug_fallbacks_collide() {
        let result = outline("<h3>???</h3><h3>!!!</h3>");

        assert_eq!(result.toc[0].id, "00003");
        assert_eq!(result.toc[1].id, "00003");
        assert_eq!(result.title, Some("???".to_owned()));
    }

    #[test]
    fn test_heading_with_attributes_untouched() {
        let html = r#"<h2 class="x">Styled</h2>"#;
        let result = outline(html);
        assert_eq!(result.html, html);
        assert!(result.toc.is_empty());
    }

    #[test]
    fn test_outline_is_deterministic() {
        let html = markdown_to_html("# A\n\n## B\n\n## B\n");
        assert_eq!(outline(&html), outline(&html));
    }
}
