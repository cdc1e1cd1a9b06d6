//! # acton-templates
//!
//! Server-side HTML template rendering for axum applications.
//!
//! ## Features
//!
//! - **Named lookups**: minijinja environments stored in an application registry under a key
//! - **Declarative handlers**: wrap a function returning a context with [`templates::template`]
//! - **Context processors**: request-derived values merged into every render
//! - **Plain-text errors**: configuration, lookup and render failures become `500` responses
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_templates::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Build the template registry
//!     let mut templates = Templates::from_config(&config.templates)?;
//!     templates.add_context_processor(RequestProcessor);
//!
//!     // Create router
//!     let index = template("index.html").handler(|_req: Request| async {
//!         Context::new().with("head", "acton-templates").with("text", "Hello World!")
//!     });
//!     let app = templates.apply(Router::new().route("/", get(index)));
//!
//!     // Run server
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.service.port)).await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod templates;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, ServiceConfig, TemplatesConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;

    pub use crate::templates::{
        render_template, render_template_with, template, AutoEscapeMode, Context,
        ContextProcessor, IntoContext, LookupConfig, RequestProcessor, Template, TemplateHandler,
        TemplateRegistry, Templates, UndefinedMode,
    };

    pub use axum::{
        extract::{Request, State},
        http::{request::Parts, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
        Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;

    // Re-export tracing macros
    pub use tracing::{debug, error, info, warn};

    // Re-export tokio for async runtime
    pub use tokio;

    // Re-export async-trait for context processor implementations
    pub use async_trait::async_trait;
}
