//! Rendering a named template for a request.
//!
//! The request is only consulted for its extensions: the
//! [`TemplateRegistry`] installed by [`Templates::apply`](super::Templates::apply)
//! and the [`RequestContext`] accumulated by context processors.

use axum::{
    body::Body,
    http::{header, request::Parts, Extensions, Request, StatusCode},
    response::Response,
};
use encoding_rs::{Encoding, UTF_8};
use std::sync::Arc;

use super::context::{Context, RequestContext};
use super::lookup::TemplateLookup;
use super::registry::TemplateRegistry;
use super::DEFAULT_KEY;
use crate::error::{Error, Result};

/// Default charset label of rendered responses
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Anything carrying request extensions.
///
/// Lets the render functions accept a full request, its parts, or the
/// extensions alone.
pub trait RequestExtensions {
    /// Borrow the request extensions.
    fn extensions(&self) -> &Extensions;
}

impl<B> RequestExtensions for Request<B> {
    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }
}

impl RequestExtensions for Parts {
    fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

impl RequestExtensions for Extensions {
    fn extensions(&self) -> &Extensions {
        self
    }
}

/// Lookup registered under `key` in the request's registry.
fn registered_lookup<R>(request: &R, key: &str) -> Result<Arc<TemplateLookup>>
where
    R: RequestExtensions + ?Sized,
{
    request
        .extensions()
        .get::<TemplateRegistry>()
        .and_then(|registry| registry.get(key))
        .ok_or_else(|| Error::NotInitialized {
            key: key.to_string(),
        })
}

/// Check that `template_name` resolves through the lookup under `key`.
///
/// # Errors
///
/// - [`Error::NotInitialized`] if no lookup is registered under `key`
/// - [`Error::TemplateNotFound`] if the lookup has no such template
pub fn ensure_template<R>(template_name: &str, request: &R, key: &str) -> Result<()>
where
    R: RequestExtensions + ?Sized,
{
    let lookup = registered_lookup(request, key)?;
    lookup.template(template_name)?;
    Ok(())
}

/// Render `template_name` to a string using the lookup stored under `key`.
///
/// Values accumulated by context processors are merged underneath
/// `context`, so handler keys win on conflict.
///
/// # Errors
///
/// - [`Error::NotInitialized`] if no lookup is registered under `key`
/// - [`Error::TemplateNotFound`] if the lookup has no such template
/// - [`Error::Render`] if the template fails to render
pub fn render_string<R>(template_name: &str, request: &R, context: &Context, key: &str) -> Result<String>
where
    R: RequestExtensions + ?Sized,
{
    let lookup = registered_lookup(request, key)?;
    let template = lookup.template(template_name)?;

    let rendered = match request.extensions().get::<RequestContext>() {
        Some(RequestContext(processed)) if !processed.is_empty() => {
            template.render(processed.merged_with(context))
        }
        _ => template.render(context),
    };
    rendered.map_err(|e| Error::render(template_name, e))
}

/// Render `template_name` into a `200 OK` HTML response with the default
/// key and charset.
///
/// # Example
///
/// ```rust,no_run
/// use acton_templates::prelude::*;
/// use acton_templates::templates::render_template;
///
/// async fn index(request: Request) -> Result<Response> {
///     let ctx = Context::new().with("head", "Hello");
///     render_template("index.html", &request, &ctx)
/// }
/// ```
pub fn render_template<R>(template_name: &str, request: &R, context: &Context) -> Result<Response>
where
    R: RequestExtensions + ?Sized,
{
    render_template_with(template_name, request, context, DEFAULT_KEY, DEFAULT_ENCODING)
}

/// Render `template_name` into a `200 OK` HTML response.
///
/// The body holds the rendered text encoded as `encoding` and
/// `Content-Type` is `text/html; charset=<encoding>`.
///
/// # Errors
///
/// Besides the rendering errors of [`render_string`],
/// [`Error::UnknownEncoding`] for an unrecognised label and
/// [`Error::Unencodable`] when the output has characters the encoding
/// cannot represent.
pub fn render_template_with<R>(
    template_name: &str,
    request: &R,
    context: &Context,
    key: &str,
    encoding: &str,
) -> Result<Response>
where
    R: RequestExtensions + ?Sized,
{
    let text = render_string(template_name, request, context, key)?;
    html_response(StatusCode::OK, encoding, text)
}

pub(crate) fn html_response(status: StatusCode, encoding: &str, text: String) -> Result<Response> {
    let body = encode_body(encoding, text)?;
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, format!("text/html; charset={encoding}"))
        .body(body)?;
    Ok(response)
}

/// Encode rendered text for the wire. Unmappable characters are an error,
/// never replaced.
fn encode_body(label: &str, text: String) -> Result<Body> {
    let encoding = output_encoding(label)?;
    if encoding == UTF_8 {
        return Ok(Body::from(text));
    }

    let (bytes, _, unmappable) = encoding.encode(&text);
    if unmappable {
        return Err(Error::Unencodable {
            encoding: label.to_string(),
        });
    }
    Ok(Body::from(bytes.into_owned()))
}

/// Resolve a charset label. Labels such as `latin-1` or `utf_8` are also
/// tried with separators removed.
fn output_encoding(label: &str) -> Result<&'static Encoding> {
    let found = Encoding::for_label(label.as_bytes()).or_else(|| {
        let compact: String = label.chars().filter(|c| !matches!(c, '-' | '_')).collect();
        Encoding::for_label(compact.as_bytes())
    });

    match found {
        // UTF-16 and the replacement encoding cannot be produced by an encoder
        Some(encoding) if encoding.output_encoding() == encoding => Ok(encoding),
        _ => Err(Error::UnknownEncoding {
            label: label.to_string(),
        }),
    }
}
