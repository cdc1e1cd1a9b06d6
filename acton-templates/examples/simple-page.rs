//! Minimal page served from an inline template.
//!
//! ```bash
//! cargo run --example simple-page
//! curl http://127.0.0.1:9000/
//! ```

use acton_templates::prelude::*;

async fn index(_req: Request) -> Context {
    Context::new()
        .with("head", "acton-templates")
        .with("text", "Hello World!")
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load()?;
    config.service.port = 9000;
    init_tracing(&config)?;

    let lookup = LookupConfig::new()
        .with_template("index.html", "<html><body><h1>{{ head }}</h1>{{ text }}</body></html>");

    let mut templates = Templates::new();
    templates.setup_with_key(config.templates.key.as_str(), &lookup)?;

    let page = template("index.html")
        .with_key(config.templates.key.as_str())
        .with_encoding(config.templates.encoding.as_str())
        .handler(index);

    let app = templates.apply(Router::new().route("/", get(page)));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.service.port)).await?;
    info!("Listening on http://127.0.0.1:{}", config.service.port);
    axum::serve(listener, app).await?;

    Ok(())
}
