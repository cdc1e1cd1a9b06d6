//! Application-scoped template registry.
//!
//! [`Templates`] collects lookups and context processors while the
//! application is assembled. [`Templates::apply`] freezes them into a
//! [`TemplateRegistry`] and installs it on a router, together with the
//! context processor middleware when processors are configured.

use axum::{extract::FromRequestParts, http::request::Parts, Extension, Router};
use std::collections::HashMap;
use std::sync::Arc;

use super::lookup::{LookupConfig, TemplateLookup};
use super::processors::{run_context_processors, ContextProcessor, ProcessorPipeline};
use super::DEFAULT_KEY;
use crate::config::TemplatesConfig;
use crate::error::{Error, Result};

/// Mutable registry used during application setup.
///
/// # Example
///
/// ```rust,no_run
/// use acton_templates::prelude::*;
///
/// # fn build() -> Result<Router> {
/// let mut templates = Templates::new();
/// templates.setup(&LookupConfig::new().with_directory("templates"))?;
/// templates.add_context_processor(RequestProcessor);
///
/// let app = Router::new().route(
///     "/",
///     get(template("index.html").handler(|_req: Request| async {
///         Context::new().with("head", "Hello")
///     })),
/// );
/// Ok(templates.apply(app))
/// # }
/// ```
#[derive(Default)]
pub struct Templates {
    lookups: HashMap<String, Arc<TemplateLookup>>,
    processors: Vec<Arc<dyn ContextProcessor>>,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("keys", &self.lookups.keys().collect::<Vec<_>>())
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl Templates {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[templates]` configuration section.
    pub fn from_config(config: &TemplatesConfig) -> Result<Self> {
        let mut templates = Self::new();
        templates.setup_with_key(config.key.clone(), &config.lookup)?;
        Ok(templates)
    }

    /// Build a lookup from `config` and store it under [`DEFAULT_KEY`].
    pub fn setup(&mut self, config: &LookupConfig) -> Result<Arc<TemplateLookup>> {
        self.setup_with_key(DEFAULT_KEY, config)
    }

    /// Build a lookup from `config` and store it under `key`.
    ///
    /// Calling this again with the same key replaces the previous lookup.
    pub fn setup_with_key(
        &mut self,
        key: impl Into<String>,
        config: &LookupConfig,
    ) -> Result<Arc<TemplateLookup>> {
        let lookup = TemplateLookup::new(config)?;
        Ok(self.register(key, lookup))
    }

    /// Build and store a lookup, and configure context processors.
    ///
    /// A non-empty `processors` list replaces the configured processors; an
    /// empty list leaves them untouched. Either way only one processor
    /// middleware is ever installed.
    pub fn setup_with(
        &mut self,
        key: impl Into<String>,
        config: &LookupConfig,
        processors: Vec<Arc<dyn ContextProcessor>>,
    ) -> Result<Arc<TemplateLookup>> {
        let lookup = self.setup_with_key(key, config)?;
        if !processors.is_empty() {
            self.set_context_processors(processors);
        }
        Ok(lookup)
    }

    /// Store an already-built lookup under `key`.
    pub fn register(&mut self, key: impl Into<String>, lookup: TemplateLookup) -> Arc<TemplateLookup> {
        let key = key.into();
        let lookup = Arc::new(lookup);
        if self.lookups.insert(key.clone(), Arc::clone(&lookup)).is_some() {
            tracing::debug!(key = %key, "Replacing template lookup");
        } else {
            tracing::debug!(key = %key, "Registered template lookup");
        }
        lookup
    }

    /// Append a context processor. Processors run in insertion order.
    pub fn add_context_processor<P>(&mut self, processor: P) -> &mut Self
    where
        P: ContextProcessor + 'static,
    {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Replace all context processors.
    pub fn set_context_processors(&mut self, processors: Vec<Arc<dyn ContextProcessor>>) -> &mut Self {
        self.processors = processors;
        self
    }

    /// Configured context processors.
    #[must_use]
    pub fn context_processors(&self) -> &[Arc<dyn ContextProcessor>] {
        &self.processors
    }

    /// Get the lookup stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<TemplateLookup>> {
        self.lookups.get(key).cloned()
    }

    /// Snapshot of the lookups as a read-only registry.
    #[must_use]
    pub fn registry(&self) -> TemplateRegistry {
        TemplateRegistry {
            lookups: Arc::new(self.lookups.clone()),
        }
    }

    /// Install the registry (and processor middleware, if any) on `router`.
    ///
    /// Apply after adding routes: axum layers only wrap routes that already
    /// exist on the router.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let registry = self.registry();

        let router = if self.processors.is_empty() {
            router
        } else {
            tracing::debug!(
                processors = self.processors.len(),
                "Installing context processor middleware"
            );
            router.layer(axum::middleware::from_fn_with_state(
                ProcessorPipeline::new(self.processors),
                run_context_processors,
            ))
        };

        router.layer(Extension(registry))
    }
}

/// Read-only lookups shared by every request.
///
/// Inserted into request extensions by [`Templates::apply`]; also usable as
/// an extractor.
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    lookups: Arc<HashMap<String, Arc<TemplateLookup>>>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("keys", &self.lookups.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateRegistry {
    /// Get the lookup stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<TemplateLookup>> {
        self.lookups.get(key).cloned()
    }

    /// Get the lookup stored under `key`, failing with a configuration error.
    pub fn lookup(&self, key: &str) -> Result<Arc<TemplateLookup>> {
        self.get(key).ok_or_else(|| Error::NotInitialized {
            key: key.to_string(),
        })
    }

    /// Registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lookups.keys().map(String::as_str)
    }
}

impl<S> FromRequestParts<S> for TemplateRegistry
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<TemplateRegistry>()
            .cloned()
            .ok_or_else(Error::not_initialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::test_support::{send, TPLT};
    use crate::templates::Context;
    use axum::{routing::get, Router};
    use http::StatusCode;

    fn page_config() -> LookupConfig {
        LookupConfig::new().with_template("tplt.html", TPLT)
    }

    #[test]
    fn test_get_returns_registered_lookup() {
        let mut templates = Templates::new();
        let lookup1 = templates.setup(&page_config()).unwrap();
        let lookup2 = templates.get(DEFAULT_KEY).unwrap();
        assert!(Arc::ptr_eq(&lookup1, &lookup2));
        assert!(templates.get("other").is_none());
    }

    #[test]
    fn test_setup_twice_replaces_entry() {
        let mut templates = Templates::new();
        let first = templates.setup(&page_config()).unwrap();
        let second = templates
            .setup(&LookupConfig::new().with_template("other.html", "other"))
            .unwrap();

        let current = templates.get(DEFAULT_KEY).unwrap();
        assert!(Arc::ptr_eq(&second, &current));
        assert!(!Arc::ptr_eq(&first, &current));
        assert!(!current.has_template("tplt.html"));
    }

    #[test]
    fn test_registry_snapshot() {
        let mut templates = Templates::new();
        let lookup = templates.setup_with_key("custom", &page_config()).unwrap();
        let registry = templates.registry();

        assert!(Arc::ptr_eq(&registry.lookup("custom").unwrap(), &lookup));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["custom"]);

        let err = registry.lookup(DEFAULT_KEY).unwrap_err();
        assert!(err.to_string().contains(DEFAULT_KEY));
    }

    #[test]
    fn test_from_config() {
        let config = TemplatesConfig {
            key: "site".to_string(),
            lookup: page_config(),
            ..TemplatesConfig::default()
        };
        let templates = Templates::from_config(&config).unwrap();
        assert!(templates.get("site").unwrap().has_template("tplt.html"));
        assert!(templates.get(DEFAULT_KEY).is_none());
    }

    #[tokio::test]
    async fn test_registry_extractor() {
        async fn keys(registry: TemplateRegistry) -> String {
            registry.keys().collect::<Vec<_>>().join(",")
        }

        let mut templates = Templates::new();
        templates.setup(&page_config()).unwrap();
        let app = templates.apply(Router::new().route("/", get(keys)));

        let (status, body) = send(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, DEFAULT_KEY);
    }

    #[tokio::test]
    async fn test_registry_extractor_without_setup() {
        async fn keys(_registry: TemplateRegistry) -> &'static str {
            "unreachable"
        }

        let app = Router::new().route("/", get(keys));
        let (status, body) = send(app, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains(DEFAULT_KEY));
    }

    #[test]
    fn test_lookup_never_mutated_by_render() {
        let mut templates = Templates::new();
        let lookup = templates.setup(&page_config()).unwrap();
        let names_before = lookup.template_names().to_vec();

        let ctx = Context::new().with("head", "H").with("text", "X");
        lookup.render("tplt.html", &ctx).unwrap();
        assert_eq!(lookup.template_names().to_vec(), names_before);
    }
}
