//! Turning context-producing functions into template-rendering handlers.
//!
//! [`template`] names a template and, optionally, the registry key, charset
//! and status to use. Wrapping a function with [`Template::handler`] (async)
//! or [`Template::handler_sync`] yields a [`TemplateHandler`], an axum
//! handler whose response is the template rendered with the returned
//! context.

use axum::{
    extract::Request,
    handler::Handler,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use super::context::{Context, IntoContext};
use super::render::{
    ensure_template, html_response, render_string, RequestExtensions, DEFAULT_ENCODING,
};
use super::DEFAULT_KEY;
use crate::error::{Error, Result};

/// Start building a handler that renders `name`.
///
/// # Example
///
/// ```rust,no_run
/// use acton_templates::prelude::*;
///
/// let index = template("index.html")
///     .with_status(StatusCode::OK)
///     .handler(|_req: Request| async {
///         Context::new().with("head", "HEAD").with("text", "text")
///     });
///
/// let app: Router = Router::new().route("/", get(index));
/// ```
pub fn template(name: impl Into<Arc<str>>) -> Template {
    Template::new(name)
}

/// Rendering parameters shared by every invocation of a handler.
#[derive(Debug, Clone)]
pub struct Template {
    name: Arc<str>,
    key: Arc<str>,
    encoding: Arc<str>,
    status: StatusCode,
}

impl Template {
    /// Render `name` with the default key, `utf-8` and `200 OK`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            key: Arc::from(DEFAULT_KEY),
            encoding: Arc::from(DEFAULT_ENCODING),
            status: StatusCode::OK,
        }
    }

    /// Use the lookup registered under `key`.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = key.into();
        self
    }

    /// Charset label written into `Content-Type`.
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<Arc<str>>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Status code of successful responses.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Template rendered by this handler.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry key of the lookup used.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Charset label of the response.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Status code of successful responses.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Render this template for `request` into an HTML response.
    pub fn render<R>(&self, request: &R, context: &Context) -> Result<Response>
    where
        R: RequestExtensions + ?Sized,
    {
        let text = render_string(&self.name, request, context, &self.key)?;
        html_response(self.status, &self.encoding, text)
    }

    /// Wrap an async function returning the template context.
    ///
    /// The function receives the request by value. Methods are supported by
    /// capturing the receiver, e.g. `move |req| Arc::clone(&this).page(req)`.
    pub fn handler<F, Fut, C>(self, f: F) -> TemplateHandler
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = C> + Send + 'static,
        C: IntoContext + 'static,
    {
        TemplateHandler {
            template: self,
            call: Arc::new(move |request: Request| HandlerOutput::deferred(f(request))),
        }
    }

    /// Wrap a synchronous function returning the template context.
    ///
    /// Rendered output is identical to the async form.
    pub fn handler_sync<F, C>(self, f: F) -> TemplateHandler
    where
        F: Fn(Request) -> C + Send + Sync + 'static,
        C: IntoContext + 'static,
    {
        TemplateHandler {
            template: self,
            call: Arc::new(move |request: Request| {
                HandlerOutput::Ready(f(request).into_context())
            }),
        }
    }
}

/// Value produced by a wrapped function, before rendering.
pub enum HandlerOutput {
    /// Context computed synchronously
    Ready(Result<Context>),
    /// Context still being computed
    Deferred(BoxFuture<'static, Result<Context>>),
}

impl std::fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl HandlerOutput {
    /// Wrap a future whose output converts into a context.
    pub fn deferred<Fut, C>(future: Fut) -> Self
    where
        Fut: Future<Output = C> + Send + 'static,
        C: IntoContext + 'static,
    {
        Self::Deferred(Box::pin(async move { future.await.into_context() }))
    }

    /// Wait for the context.
    pub async fn resolve(self) -> Result<Context> {
        match self {
            Self::Ready(result) => result,
            Self::Deferred(future) => future.await,
        }
    }
}

type HandlerFn = dyn Fn(Request) -> HandlerOutput + Send + Sync;

/// Axum handler rendering a [`Template`] with the context returned by the
/// wrapped function.
///
/// Any failure becomes a `500 Internal Server Error` with a plain-text
/// description.
#[derive(Clone)]
pub struct TemplateHandler {
    template: Template,
    call: Arc<HandlerFn>,
}

impl std::fmt::Debug for TemplateHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateHandler")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl TemplateHandler {
    /// Rendering parameters of this handler.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Invoke the wrapped function and render its context.
    ///
    /// A missing setup or template is reported ahead of a context that is
    /// not a mapping.
    pub async fn respond(&self, request: Request) -> Result<Response> {
        let extensions = request.extensions().clone();
        match (self.call)(request).resolve().await {
            Ok(context) => self.template.render(&extensions, &context),
            Err(invalid @ Error::InvalidContext { .. }) => {
                ensure_template(&self.template.name, &extensions, &self.template.key)?;
                Err(invalid)
            }
            Err(err) => Err(err),
        }
    }
}

impl<S> Handler<(), S> for TemplateHandler
where
    S: Send + Sync + 'static,
{
    type Future = BoxFuture<'static, Response>;

    fn call(self, req: Request, _state: S) -> Self::Future {
        Box::pin(async move {
            match self.respond(req).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            }
        })
    }
}
