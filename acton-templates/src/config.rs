//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: ACTON_, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. Default values
//!
//! ```toml
//! [service]
//! name = "pages"
//! port = 8080
//!
//! [templates]
//! key = "acton_templates_lookup"
//! encoding = "utf-8"
//!
//! [templates.lookup]
//! directories = ["templates"]
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::templates::{LookupConfig, DEFAULT_ENCODING, DEFAULT_KEY};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Template engine configuration
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Template engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Registry key the lookup is stored under
    #[serde(default = "default_key")]
    pub key: String,

    /// Charset label of rendered responses
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Lookup construction options
    #[serde(default)]
    pub lookup: LookupConfig,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            encoding: default_encoding(),
            lookup: LookupConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

impl Config {
    /// Load configuration from `./config.toml` and the environment.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables (ACTON_ prefix) still override file values.
    pub fn load_from(path: &str) -> Result<Self> {
        tracing::debug!("Loading configuration from: {}", path);

        let config = Self::figment(path).extract()?;
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Load from config file (if exists)
            .merge(Toml::file(path))
            // Override with environment variables
            .merge(Env::prefixed("ACTON_").split("__"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "acton-templates".to_string(),
                port: default_port(),
                log_level: default_log_level(),
            },
            templates: TemplatesConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{AutoEscapeMode, UndefinedMode};
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.templates.key, DEFAULT_KEY);
        assert_eq!(config.templates.encoding, "utf-8");
        assert!(config.templates.lookup.directories.is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from("/nonexistent/acton-templates/config.toml").unwrap();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.templates.key, DEFAULT_KEY);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[service]
name = "pages"
port = 9000

[templates]
key = "site"
encoding = "latin-1"

[templates.lookup]
directories = ["templates", "shared"]
auto_escape = "html"
undefined = "strict"
trim_blocks = true

[templates.lookup.templates]
"inline.html" = "<p>{{{{ text }}}}</p>"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.service.name, "pages");
        assert_eq!(config.service.port, 9000);
        assert_eq!(config.service.log_level, "info");

        let templates = &config.templates;
        assert_eq!(templates.key, "site");
        assert_eq!(templates.encoding, "latin-1");
        assert_eq!(
            templates.lookup.directories,
            vec![PathBuf::from("templates"), PathBuf::from("shared")]
        );
        assert_eq!(templates.lookup.auto_escape, AutoEscapeMode::Html);
        assert_eq!(templates.lookup.undefined, UndefinedMode::Strict);
        assert!(templates.lookup.trim_blocks);
        assert_eq!(
            templates.lookup.templates.get("inline.html").map(String::as_str),
            Some("<p>{{ text }}</p>")
        );
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[service]\nport = \"not a number\"\n").unwrap();

        let err = Config::load_from(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
