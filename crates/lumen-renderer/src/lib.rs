//! Markdown to HTML conversion for Lumen.
//!
//! Content goes through two stages:
//!
//! 1. [`markdown_to_html`] converts Markdown source with the common
//!    extension set (tables, strikethrough, task lists, footnotes).
//! 2. [`outline`] post-processes any HTML fragment: it extracts the page
//!    title from the first heading, assigns every heading an anchor id and
//!    collects a table of contents.
//!
//! # Example
//!
//! ```
//! use lumen_renderer::{markdown_to_html, outline};
//!
//! let html = markdown_to_html("# Hello\n\nSome *text*.");
//! let result = outline(&html);
//! assert_eq!(result.title.as_deref(), Some("Hello"));
//! assert!(result.html.contains(r##"<h1 id="hello"><a href="#hello">Hello</a></h1>"##));
//! ```

mod headings;
mod markdown;
mod util;

pub use headings::{Outline, TocEntry, outline};
pub use markdown::{markdown_to_html, parser_options};
pub use util::{escape_html, slugify, unescape_html};
