//! Per-host `site.yaml` settings.
//!
//! The `document` section is decoded once into [`DocumentLayout`]. Everything
//! else stays in a YAML tree that templates query with slash-separated paths
//! such as `page/brand` or `menu/links`.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::ConfigError;

/// Name of the settings file at the root of each host's document root.
pub const SITE_SETTINGS_FILENAME: &str = "site.yaml";

/// Directory names under a host's document root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentLayout {
    /// Static files served verbatim.
    pub webroot: String,
    /// Markdown, HTML and text content.
    pub markdown: String,
    /// Template files.
    pub templates: String,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            webroot: "webroot".to_owned(),
            markdown: "markdown".to_owned(),
            templates: "templates".to_owned(),
        }
    }
}

/// Settings of a single site.
#[derive(Debug, Clone, Default)]
pub struct SiteSettings {
    /// Directory layout overrides.
    pub document: DocumentLayout,
    tree: Value,
}

impl SiteSettings {
    /// Load `site.yaml` from a host's document root.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when the file is missing, or a parse
    /// or validation error when its content is invalid.
    pub fn load(document_root: &Path) -> Result<Self, ConfigError> {
        let path = document_root.join(SITE_SETTINGS_FILENAME);
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content)
    }

    /// Parse site settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid YAML or the `document` section
    /// has an invalid shape.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let tree: Value = serde_yaml::from_str(content)?;
        let tree = match tree {
            Value::Null => Value::Mapping(serde_yaml::Mapping::new()),
            Value::Mapping(_) => tree,
            _ => {
                return Err(ConfigError::Validation(
                    "site.yaml must contain a mapping".to_owned(),
                ));
            }
        };

        let document = match tree.get("document") {
            Some(section) if !section.is_null() => serde_yaml::from_value(section.clone())?,
            _ => DocumentLayout::default(),
        };

        for (value, field) in [
            (&document.webroot, "document.webroot"),
            (&document.markdown, "document.markdown"),
            (&document.templates, "document.templates"),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!("{field} cannot be empty")));
            }
        }

        Ok(Self { document, tree })
    }

    /// Look up a raw value by slash-separated path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.tree, |node, segment| node.get(segment))
    }

    /// Look up a scalar value rendered as a string.
    ///
    /// Numbers and booleans are converted to their textual form.
    #[must_use]
    pub fn get_string(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Look up a sequence value.
    #[must_use]
    pub fn get_list(&self, path: &str) -> Option<&[Value]> {
        self.get(path)?.as_sequence().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SITE: &str = r"
page:
  brand: Lumen
  year: 2024
  draft: false
document:
  markdown: content
menu:
  links:
    - text: About
      url: /about
    - text: Source
      url: https://example.com/src
";

    #[test]
    fn test_default_layout() {
        let settings = SiteSettings::from_yaml("").unwrap();
        assert_eq!(settings.document, DocumentLayout::default());
        assert_eq!(settings.document.webroot, "webroot");
        assert_eq!(settings.document.markdown, "markdown");
        assert_eq!(settings.document.templates, "templates");
    }

    #[test]
    fn test_partial_layout_override() {
        let settings = SiteSettings::from_yaml(SITE).unwrap();
        assert_eq!(settings.document.markdown, "content");
        assert_eq!(settings.document.webroot, "webroot");
    }

    #[test]
    fn test_get_string() {
        let settings = SiteSettings::from_yaml(SITE).unwrap();
        assert_eq!(settings.get_string("page/brand"), Some("Lumen".to_owned()));
        assert_eq!(settings.get_string("page/year"), Some("2024".to_owned()));
        assert_eq!(settings.get_string("page/draft"), Some("false".to_owned()));
        assert_eq!(settings.get_string("page/missing"), None);
        assert_eq!(settings.get_string("menu/links"), None);
    }

    #[test]
    fn test_get_list() {
        let settings = SiteSettings::from_yaml(SITE).unwrap();
        let links = settings.get_list("menu/links").unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].get("text").and_then(Value::as_str),
            Some("About")
        );
        assert!(settings.get_list("page/brand").is_none());
    }

    #[test]
    fn test_get_ignores_empty_segments() {
        let settings = SiteSettings::from_yaml(SITE).unwrap();
        assert_eq!(settings.get_string("/page//brand/"), Some("Lumen".to_owned()));
    }

    #[test]
    fn test_rejects_non_mapping() {
        let err = SiteSettings::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_empty_layout_name() {
        let err = SiteSettings::from_yaml("document:\n  webroot: ''\n").unwrap_err();
        assert!(err.to_string().contains("document.webroot"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SiteSettings::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_document_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SITE_SETTINGS_FILENAME), SITE).unwrap();
        let settings = SiteSettings::load(dir.path()).unwrap();
        assert_eq!(settings.document.markdown, "content");
    }
}
