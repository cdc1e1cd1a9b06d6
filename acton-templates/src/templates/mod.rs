//! Runtime template rendering for axum handlers.
//!
//! Templates are loaded and compiled by a [`TemplateLookup`] (backed by
//! minijinja) and stored in an application-scoped registry under a string
//! key. Handlers render them either explicitly through [`render_template`]
//! or declaratively by wrapping a context-producing function with
//! [`template`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use acton_templates::prelude::*;
//!
//! async fn index(_req: Request) -> Context {
//!     Context::new().with("head", "Hello").with("text", "World")
//! }
//!
//! # async fn run() -> Result<()> {
//! let mut templates = Templates::new();
//! templates.setup(
//!     &LookupConfig::new()
//!         .with_template("index.html", "<h1>{{ head }}</h1>{{ text }}"),
//! )?;
//! templates.add_context_processor(RequestProcessor);
//!
//! let app = templates.apply(
//!     Router::new().route("/", get(template("index.html").handler(index))),
//! );
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Context Processors
//!
//! Processors contribute request-derived values (the current user, the
//! request path, a CSRF token) to every render. They run in order before the
//! handler; later processors win on key conflicts and the handler's own
//! context wins over all of them. See [`ContextProcessor`].

mod context;
mod handler;
mod lookup;
mod processors;
mod registry;
mod render;

pub use context::{Context, IntoContext, RequestContext};
pub use handler::{template, HandlerOutput, Template, TemplateHandler};
pub use lookup::{AutoEscapeMode, LookupConfig, TemplateLookup, UndefinedMode};
pub use processors::{
    processor_fn, run_context_processors, ContextProcessor, ProcessorPipeline, RequestProcessor,
    SENSITIVE_HEADERS,
};
pub use registry::{TemplateRegistry, Templates};
pub use render::{
    ensure_template, render_string, render_template, render_template_with, RequestExtensions,
    DEFAULT_ENCODING,
};

/// Registry key used when none is given
pub const DEFAULT_KEY: &str = "acton_templates_lookup";

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::{to_bytes, Body},
        extract::Request,
        http::StatusCode,
        response::Response,
        Router,
    };
    use tower::ServiceExt;

    /// Page used across the handler and processor tests
    pub const TPLT: &str = "<html><body><h1>{{ head }}</h1>{{ text }}</body></html>";

    pub async fn fetch(app: Router, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap()
    }

    pub async fn send(app: Router, uri: &str) -> (StatusCode, String) {
        let response = fetch(app, uri).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}
