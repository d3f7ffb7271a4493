//! Startup messages on stderr.

use std::fmt::Display;

use console::{Style, Term};

/// Styled writer for the handful of lines printed before logging takes over.
pub(crate) struct Output {
    term: Term,
    dim: Style,
    warn: Style,
    fail: Style,
    title: Style,
}

impl Output {
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            dim: Style::new().dim(),
            warn: Style::new().yellow(),
            fail: Style::new().red().bold(),
            title: Style::new().cyan().bold(),
        }
    }

    fn line(&self, text: impl Display) {
        // Nothing sensible to do when stderr is gone.
        let _ = self.term.write_line(&text.to_string());
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(msg);
    }

    /// `key -> value` pair, indented under a heading.
    pub(crate) fn entry(&self, key: &str, value: impl Display) {
        self.line(format_args!("  {key} {} {value}", self.dim.apply_to("->")));
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(self.warn.apply_to(msg));
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(self.fail.apply_to(msg));
    }

    pub(crate) fn highlight(&self, msg: &str) {
        self.line(self.title.apply_to(msg));
    }
}
