//! Template lookup: the long-lived registry entry holding compiled templates.
//!
//! A [`TemplateLookup`] wraps a `minijinja` environment configured from a
//! [`LookupConfig`]. Templates come from inline sources registered up front
//! and from on-disk directories searched in order on first use.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use super::context::Context;
use crate::error::{Error, Result};

/// Auto-escaping applied to rendered values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoEscapeMode {
    /// Escape HTML for `.html`, `.htm` and `.xml` templates only.
    #[default]
    ByExtension,
    /// Always escape HTML.
    Html,
    /// Never escape.
    None,
}

/// Behavior when a template references a variable the context lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedMode {
    /// Undefined values print as empty strings.
    #[default]
    Lenient,
    /// Attribute lookups on undefined values also yield undefined.
    Chainable,
    /// Any use of an undefined value is a rendering error.
    Strict,
}

impl From<UndefinedMode> for UndefinedBehavior {
    fn from(mode: UndefinedMode) -> Self {
        match mode {
            UndefinedMode::Lenient => UndefinedBehavior::Lenient,
            UndefinedMode::Chainable => UndefinedBehavior::Chainable,
            UndefinedMode::Strict => UndefinedBehavior::Strict,
        }
    }
}

/// Configuration for building a [`TemplateLookup`].
///
/// # Example
///
/// ```toml
/// [templates.lookup]
/// directories = ["templates"]
/// auto_escape = "html"
/// undefined = "strict"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Directories searched, in order, for templates not registered inline
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// Inline template sources keyed by template name
    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    /// Auto-escaping mode
    #[serde(default)]
    pub auto_escape: AutoEscapeMode,

    /// Undefined variable handling
    #[serde(default)]
    pub undefined: UndefinedMode,

    /// Remove the first newline after a block tag
    #[serde(default)]
    pub trim_blocks: bool,

    /// Strip leading whitespace before a block tag
    #[serde(default)]
    pub lstrip_blocks: bool,

    /// Keep the trailing newline at the end of a template
    #[serde(default)]
    pub keep_trailing_newline: bool,
}

impl LookupConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template directory.
    #[must_use]
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Register an inline template.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Set the auto-escaping mode.
    #[must_use]
    pub fn with_auto_escape(mut self, mode: AutoEscapeMode) -> Self {
        self.auto_escape = mode;
        self
    }

    /// Set undefined variable handling.
    #[must_use]
    pub fn with_undefined(mut self, mode: UndefinedMode) -> Self {
        self.undefined = mode;
        self
    }
}

/// Compiled template store for one application.
///
/// Built once during setup, then shared read-only behind an `Arc` by every
/// request. Rendering never mutates it.
pub struct TemplateLookup {
    env: Environment<'static>,
    inline: Vec<String>,
    directories: Vec<PathBuf>,
}

impl std::fmt::Debug for TemplateLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateLookup")
            .field("inline", &self.inline)
            .field("directories", &self.directories)
            .finish()
    }
}

impl TemplateLookup {
    /// Build a lookup from configuration.
    ///
    /// Inline templates are compiled immediately, so syntax errors surface
    /// here as [`Error::Render`].
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let mut env = Environment::new();

        match config.auto_escape {
            AutoEscapeMode::ByExtension => {}
            AutoEscapeMode::Html => env.set_auto_escape_callback(|_| AutoEscape::Html),
            AutoEscapeMode::None => env.set_auto_escape_callback(|_| AutoEscape::None),
        }
        env.set_undefined_behavior(config.undefined.into());
        env.set_trim_blocks(config.trim_blocks);
        env.set_lstrip_blocks(config.lstrip_blocks);
        env.set_keep_trailing_newline(config.keep_trailing_newline);

        if !config.directories.is_empty() {
            let dirs = config.directories.clone();
            env.set_loader(move |name| load_from_directories(&dirs, name));
        }

        let mut lookup = Self {
            env,
            inline: Vec::new(),
            directories: config.directories.clone(),
        };

        for (name, source) in &config.templates {
            lookup.add_template(name.clone(), source.clone())?;
        }

        tracing::debug!(
            inline = lookup.inline.len(),
            directories = ?lookup.directories,
            "Template lookup created"
        );

        Ok(lookup)
    }

    /// Register an inline template, replacing any previous one with that name.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|e| Error::render(&name, e))?;
        if !self.inline.contains(&name) {
            self.inline.push(name);
        }
        Ok(())
    }

    /// Builder form of [`add_template`](Self::add_template).
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        self.add_template(name, source)?;
        Ok(self)
    }

    /// Names of inline templates, in registration order.
    #[must_use]
    pub fn template_names(&self) -> &[String] {
        &self.inline
    }

    /// Directories searched for templates.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Check whether `name` resolves to a template.
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Resolve `name` and render it with `context`.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateNotFound`] if no template has this name
    /// - [`Error::Render`] if the template fails to compile or render
    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        self.template(name)?
            .render(context)
            .map_err(|e| Error::render(name, e))
    }

    /// Resolve and compile `name` without rendering it.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateNotFound`] if no template has this name
    /// - [`Error::Render`] if the template fails to compile
    pub fn template(&self, name: &str) -> Result<minijinja::Template<'_, '_>> {
        self.env
            .get_template(name)
            .map_err(|e| Error::from_engine(name, e))
    }

    /// Borrow the underlying environment.
    #[must_use]
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }
}

/// Loader callback searching each directory in turn.
fn load_from_directories(
    dirs: &[PathBuf],
    name: &str,
) -> std::result::Result<Option<String>, minijinja::Error> {
    let Some(relative) = safe_relative_path(name) else {
        return Ok(None);
    };

    for dir in dirs {
        let path = dir.join(&relative);
        match std::fs::read_to_string(&path) {
            Ok(source) => return Ok(Some(source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(minijinja::Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("could not read template {}", path.display()),
                )
                .with_source(e))
            }
        }
    }

    Ok(None)
}

/// Turn a template name into a relative path, refusing anything that could
/// escape the template directories.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TPLT: &str = "<html><body><h1>{{ head }}</h1>{{ text }}</body></html>";

    fn page_context() -> Context {
        Context::new().with("head", "H").with("text", "X")
    }

    #[test]
    fn test_render_inline_template() {
        let lookup = TemplateLookup::new(&LookupConfig::new().with_template("tplt.html", TPLT)).unwrap();
        let html = lookup.render("tplt.html", &page_context()).unwrap();
        assert_eq!(html, "<html><body><h1>H</h1>X</body></html>");
    }

    #[test]
    fn test_render_is_repeatable() {
        let lookup = TemplateLookup::new(&LookupConfig::new().with_template("tplt.html", TPLT)).unwrap();
        let first = lookup.render("tplt.html", &page_context()).unwrap();
        let second = lookup.render("tplt.html", &page_context()).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_missing_template() {
        let lookup = TemplateLookup::new(&LookupConfig::new()).unwrap();
        let err = lookup.render("missing", &Context::new()).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { ref name } if name == "missing"));
        assert!(!lookup.has_template("missing"));
    }

    #[test]
    fn test_syntax_error_at_setup() {
        let result = TemplateLookup::new(&LookupConfig::new().with_template("bad.html", "{% if %}"));
        assert!(matches!(result, Err(Error::Render { .. })));
    }

    #[test]
    fn test_strict_undefined_is_render_error() {
        let config = LookupConfig::new()
            .with_template("tplt.html", TPLT)
            .with_undefined(UndefinedMode::Strict);
        let lookup = TemplateLookup::new(&config).unwrap();

        let err = lookup
            .render("tplt.html", &Context::new().with("head", "H"))
            .unwrap_err();
        assert!(matches!(err, Error::Render { ref template, .. } if template == "tplt.html"));
        assert!(err.report().unwrap().contains("tplt.html"));
    }

    #[test]
    fn test_auto_escape_modes() {
        let source = "{{ text }}";
        let ctx = Context::new().with("text", "<b>");

        let by_ext = TemplateLookup::new(
            &LookupConfig::new()
                .with_template("a.html", source)
                .with_template("a.txt", source),
        )
        .unwrap();
        assert_eq!(by_ext.render("a.html", &ctx).unwrap(), "&lt;b&gt;");
        assert_eq!(by_ext.render("a.txt", &ctx).unwrap(), "<b>");

        let always = TemplateLookup::new(
            &LookupConfig::new()
                .with_template("a.txt", source)
                .with_auto_escape(AutoEscapeMode::Html),
        )
        .unwrap();
        assert_eq!(always.render("a.txt", &ctx).unwrap(), "&lt;b&gt;");

        let never = TemplateLookup::new(
            &LookupConfig::new()
                .with_template("a.html", source)
                .with_auto_escape(AutoEscapeMode::None),
        )
        .unwrap();
        assert_eq!(never.render("a.html", &ctx).unwrap(), "<b>");
    }

    #[test]
    fn test_directory_loader() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(second.path().join("pages")).unwrap();
        std::fs::write(second.path().join("pages/index.html"), "<p>{{ text }}</p>").unwrap();
        std::fs::write(first.path().join("shadow.html"), "first").unwrap();
        std::fs::write(second.path().join("shadow.html"), "second").unwrap();

        let config = LookupConfig::new()
            .with_directory(first.path())
            .with_directory(second.path());
        let lookup = TemplateLookup::new(&config).unwrap();

        let html = lookup
            .render("pages/index.html", &Context::new().with("text", "hi"))
            .unwrap();
        assert_eq!(html, "<p>hi</p>");
        assert_eq!(lookup.render("shadow.html", &Context::new()).unwrap(), "first");
        assert!(matches!(
            lookup.render("../escape.html", &Context::new()),
            Err(Error::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_inline_takes_precedence_over_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tplt.html"), "from disk").unwrap();

        let config = LookupConfig::new()
            .with_directory(dir.path())
            .with_template("tplt.html", "inline");
        let lookup = TemplateLookup::new(&config).unwrap();
        assert_eq!(lookup.render("tplt.html", &Context::new()).unwrap(), "inline");
        assert_eq!(lookup.template_names().to_vec(), vec!["tplt.html".to_string()]);
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("a/b.html"), Some(PathBuf::from("a/b.html")));
        assert_eq!(safe_relative_path("./a.html"), Some(PathBuf::from("a.html")));
        assert_eq!(safe_relative_path("../a.html"), None);
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path(""), None);
    }
}
