//! Error types and HTTP response conversion
//!
//! Every template failure surfaces as `500 Internal Server Error` with a
//! descriptive plain-text body. The four template error kinds stay distinct
//! so callers can match on them before they are turned into a response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt::Write as _;
use thiserror::Error;

use crate::templates::DEFAULT_KEY;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error type
#[derive(Debug, Error)]
pub enum Error {
    /// No template lookup was registered under the requested key
    #[error("Template engine is not initialized, call Templates::setup(key = \"{key}\") first")]
    NotInitialized {
        /// Registry key that was looked up
        key: String,
    },

    /// The lookup has no template with this name
    #[error("Template '{name}' not found")]
    TemplateNotFound {
        /// Requested template name
        name: String,
    },

    /// A dynamic value handed over as context was not a key-value mapping
    #[error("context should be mapping, not {type_name}")]
    InvalidContext {
        /// Runtime type (or JSON kind) of the rejected value
        type_name: String,
    },

    /// The template engine failed while compiling or rendering a template
    #[error("Failed to render template '{template}'")]
    Render {
        /// Template being rendered
        template: String,
        /// Human-readable diagnostic with the failing line and source excerpt
        report: String,
        /// Original engine error, kept for its location information
        #[source]
        source: minijinja::Error,
    },

    /// The charset label does not name an output encoding
    #[error("Unknown output encoding '{label}'")]
    UnknownEncoding {
        /// Label as configured
        label: String,
    },

    /// The rendered text has characters the output encoding cannot represent
    #[error("Rendered output cannot be encoded as '{encoding}'")]
    Unencodable {
        /// Label as configured
        encoding: String,
    },

    /// A context processor failed
    #[error("Context processor failed: {0}")]
    Processor(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response could not be assembled
    #[error("HTTP error: {0}")]
    Http(Box<http::Error>),
}

impl Error {
    /// Configuration error for the default registry key
    pub fn not_initialized() -> Self {
        Self::NotInitialized {
            key: DEFAULT_KEY.to_string(),
        }
    }

    /// Wrap an engine error raised while working on `template`.
    ///
    /// A missing template keeps its own kind; anything else becomes a
    /// [`Error::Render`] carrying a formatted diagnostic report.
    pub fn from_engine(template: &str, err: minijinja::Error) -> Self {
        if err.kind() == minijinja::ErrorKind::TemplateNotFound {
            return Self::TemplateNotFound {
                name: template.to_string(),
            };
        }

        Self::render(template, err)
    }

    /// Wrap an engine error as a [`Error::Render`] with a diagnostic report.
    pub fn render(template: &str, err: minijinja::Error) -> Self {
        Self::Render {
            template: template.to_string(),
            report: render_report(template, &err),
            source: err,
        }
    }

    /// Error for a processor failure
    pub fn processor(msg: impl Into<String>) -> Self {
        Self::Processor(msg.into())
    }

    /// Diagnostic report for rendering failures
    pub fn report(&self) -> Option<&str> {
        match self {
            Self::Render { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Format an engine error into a plain-text diagnostic.
fn render_report(template: &str, err: &minijinja::Error) -> String {
    let mut report = String::new();

    let origin = err.name().unwrap_or(template);
    let _ = writeln!(report, "Error rendering template '{}'", template);
    match err.line() {
        Some(line) => {
            let _ = writeln!(report, "  at {}:{}", origin, line);
        }
        None => {
            let _ = writeln!(report, "  at {}", origin);
        }
    }
    let _ = writeln!(report, "  kind: {}", err.kind());
    if let Some(detail) = err.detail() {
        let _ = writeln!(report, "  detail: {}", detail);
    }

    let mut cause = std::error::Error::source(err);
    while let Some(inner) = cause {
        let _ = writeln!(report, "  caused by: {}", inner);
        cause = inner.source();
    }

    let debug_info = err.display_debug_info().to_string();
    if !debug_info.is_empty() {
        report.push('\n');
        report.push_str(&debug_info);
    }

    report
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = match self {
            Error::Render {
                ref template,
                ref report,
                ref source,
            } => {
                tracing::error!(
                    template = %template,
                    line = ?source.line(),
                    "Template rendering error: {}", source
                );
                report.clone()
            }

            Error::Config(ref e) => {
                tracing::error!("Configuration error: {}", e);
                self.to_string()
            }

            Error::Io(ref e) => {
                tracing::error!("I/O error: {}", e);
                self.to_string()
            }

            Error::Http(ref e) => {
                tracing::error!("HTTP error: {}", e);
                self.to_string()
            }

            Error::UnknownEncoding { .. } | Error::Unencodable { .. } => {
                tracing::error!("Response encoding error: {}", self);
                self.to_string()
            }

            Error::Processor(ref msg) => {
                tracing::error!("Context processor error: {}", msg);
                self.to_string()
            }

            Error::NotInitialized { .. }
            | Error::TemplateNotFound { .. }
            | Error::InvalidContext { .. } => self.to_string(),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_error(source: &str) -> minijinja::Error {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_template("broken.html", source).unwrap();
        env.get_template("broken.html")
            .unwrap()
            .render(minijinja::context! {})
            .unwrap_err()
    }

    #[test]
    fn test_not_initialized_message_names_key() {
        let err = Error::not_initialized();
        assert_eq!(
            err.to_string(),
            format!(
                "Template engine is not initialized, call Templates::setup(key = \"{}\") first",
                DEFAULT_KEY
            )
        );
    }

    #[test]
    fn test_template_not_found_message() {
        let err = Error::TemplateNotFound {
            name: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "Template 'missing' not found");
    }

    #[test]
    fn test_from_engine_keeps_not_found_kind() {
        let env = minijinja::Environment::new();
        let err = env.get_template("nope.html").unwrap_err();
        let err = Error::from_engine("nope.html", err);
        assert!(matches!(err, Error::TemplateNotFound { ref name } if name == "nope.html"));
        assert!(err.report().is_none());
    }

    #[test]
    fn test_render_error_report() {
        let err = Error::from_engine("broken.html", engine_error("line one\n{{ missing }}"));

        let report = err.report().expect("render errors carry a report");
        assert!(report.contains("broken.html"));
        assert!(report.contains("broken.html:2"));
        assert!(report.contains("undefined"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_into_response_status_and_body() {
        let response = Error::TemplateNotFound {
            name: "missing".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Error::InvalidContext {
            type_name: "string".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
