//! Context processors: request-derived values injected into every render.
//!
//! Processors run in order before the routed handler. Each returns a partial
//! [`Context`]; later processors overwrite keys from earlier ones, and the
//! handler's own context overwrites them all at render time.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

use super::context::{Context, RequestContext};
use crate::error::Result;

/// Headers never copied into the `request` template variable
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// Contributes request-derived values to the template context.
///
/// Closures of the form `Fn(&Parts) -> impl Future<Output = Result<Context>>`
/// implement this trait as long as the returned future does not borrow the
/// request parts.
///
/// # Example
///
/// ```rust
/// use acton_templates::prelude::*;
/// use acton_templates::templates::processor_fn;
///
/// let current_path = processor_fn(|parts: &Parts| {
///     let path = parts.uri.path().to_owned();
///     async move { Ok::<_, Error>(Context::new().with("current_path", path)) }
/// });
///
/// let mut templates = Templates::new();
/// templates.add_context_processor(current_path);
/// ```
#[async_trait]
pub trait ContextProcessor: Send + Sync {
    /// Produce a partial context for this request.
    async fn process(&self, parts: &Parts) -> Result<Context>;
}

#[async_trait]
impl<F, Fut> ContextProcessor for F
where
    F: Fn(&Parts) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Context>> + Send + 'static,
{
    async fn process(&self, parts: &Parts) -> Result<Context> {
        (self)(parts).await
    }
}

/// Pin down the closure signature of a processor.
///
/// Helps type inference for closures written inline.
pub fn processor_fn<F, Fut>(f: F) -> F
where
    F: Fn(&Parts) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Context>> + Send + 'static,
{
    f
}

/// Built-in processor exposing the request as the `request` variable.
///
/// Templates can then use `{{ request.path }}`, `{{ request.method }}`,
/// `{{ request.query }}`, `{{ request.uri }}`, `{{ request.version }}` and
/// `{{ request.headers["user-agent"] }}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestProcessor;

#[async_trait]
impl ContextProcessor for RequestProcessor {
    async fn process(&self, parts: &Parts) -> Result<Context> {
        Ok(Context::new().with("request", request_value(parts)))
    }
}

/// Build the `request` variable from the request parts.
fn request_value(parts: &Parts) -> Value {
    let mut headers = Map::new();
    for (name, value) in &parts.headers {
        if SENSITIVE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), Value::from(value));
        }
    }

    json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query().unwrap_or_default(),
        "uri": parts.uri.to_string(),
        "version": format!("{:?}", parts.version),
        "headers": headers,
    })
}

/// Ordered, immutable list of processors shared by all requests.
#[derive(Clone)]
pub struct ProcessorPipeline {
    processors: Arc<[Arc<dyn ContextProcessor>]>,
}

impl std::fmt::Debug for ProcessorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorPipeline")
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl ProcessorPipeline {
    /// Create a pipeline from processors in execution order.
    #[must_use]
    pub fn new(processors: Vec<Arc<dyn ContextProcessor>>) -> Self {
        Self {
            processors: processors.into(),
        }
    }

    /// Number of processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the pipeline has no processors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor in order and merge their results, later wins.
    ///
    /// Processors run one after another, never concurrently. The first
    /// failure stops the pipeline.
    pub async fn collect(&self, parts: &Parts) -> Result<Context> {
        let mut context = Context::new();
        for (index, processor) in self.processors.iter().enumerate() {
            let partial = processor.process(parts).await?;
            tracing::debug!(index, keys = partial.len(), "Context processor applied");
            context.merge(partial);
        }
        Ok(context)
    }
}

/// Middleware running the processor pipeline before the routed handler.
///
/// Installed by [`Templates::apply`](super::Templates::apply) via
/// `axum::middleware::from_fn_with_state`. The accumulated context is stored
/// as [`RequestContext`] in the request extensions.
pub async fn run_context_processors(
    State(pipeline): State<ProcessorPipeline>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    match pipeline.collect(&parts).await {
        Ok(context) => {
            parts.extensions.insert(RequestContext(context));
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => err.into_response(),
    }
}
