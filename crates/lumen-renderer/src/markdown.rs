use pulldown_cmark::{Options, Parser, html};

/// Parser options used for all Markdown content.
///
/// CommonMark plus tables, strikethrough, task lists and footnotes. Fenced
/// code blocks and `<scheme://...>` autolinks are part of CommonMark itself.
#[must_use]
pub fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Convert Markdown source to an HTML fragment.
///
/// Raw HTML in the source is passed through unchanged.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options());
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}
