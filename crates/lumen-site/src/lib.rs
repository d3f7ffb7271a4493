//! Virtual hosts and page rendering for Lumen.
//!
//! A [`Host`] serves one document root:
//!
//! - static files under `webroot/` are returned as is;
//! - other paths are resolved inside `markdown/` by [`resolve`], trying the
//!   directory index and then the `.md`, `.html` and `.txt` extensions;
//! - the resolved file is loaded, its headings get anchors, navigation is
//!   derived from the directory listing, and the resulting [`Page`] is rendered
//!   through `templates/index.tpl`.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use lumen_site::{Host, Outcome, RequestContext};
//!
//! let host = Host::new("example.com", Path::new("sites/example"))?;
//! match host.serve(&RequestContext::new("/docs/")) {
//!     Outcome::Page(html) => println!("{html}"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

mod host;
mod loader;
mod navigation;
mod page;
mod resolver;
mod templates;

pub use host::{Host, HostState, Outcome, SiteError};
pub use loader::{load, load_fragment};
pub use navigation::{Navigation, breadcrumb, menu, side_menu, title_from_name, title_from_slug};
pub use page::{Anchor, Page, RequestContext};
pub use resolver::{CONTENT_EXTENSIONS, Resolved, is_safe, resolve};
pub use templates::{
    INDEX_TEMPLATE, TEMPLATE_SUFFIX, TemplateError, TemplateHelpers, TemplateStore, is_external,
};
