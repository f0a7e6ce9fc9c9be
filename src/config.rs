//! Site and API configuration.
//!
//! The serving host owns durable settings storage; this crate only needs a
//! small read-only snapshot of them per process. `ApiConfig::from_env` loads
//! that snapshot from `WAYPOST_*` environment variables, which is convenient
//! for binaries and tests; embedders that already have a settings store can
//! construct the struct directly.

use std::env;

/// Read-only configuration consumed by the dispatch core.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Site title, reported by the discovery index.
    pub site_name: String,
    /// Site tagline, reported by the discovery index.
    pub site_description: String,
    /// Canonical site URL.
    pub site_url: String,
    /// Absolute URL the API is mounted at, e.g. `http://example.test/api`.
    /// Links under this prefix are eligible for embedding.
    pub api_root: String,
    /// Charset advertised in `Content-Type` headers.
    pub charset: String,
    /// Master switch. When off every call answers 404 before dispatch.
    pub enabled: bool,
    /// Whether `_jsonp` requests are honored.
    pub jsonp_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            site_name: "Waypost".to_string(),
            site_description: String::new(),
            site_url: "http://localhost".to_string(),
            api_root: "http://localhost/api".to_string(),
            charset: "UTF-8".to_string(),
            enabled: true,
            jsonp_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Load configuration from `WAYPOST_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            site_name: env::var("WAYPOST_SITE_NAME").unwrap_or(defaults.site_name),
            site_description: env::var("WAYPOST_SITE_DESCRIPTION")
                .unwrap_or(defaults.site_description),
            site_url: env::var("WAYPOST_SITE_URL").unwrap_or(defaults.site_url),
            api_root: env::var("WAYPOST_API_ROOT").unwrap_or(defaults.api_root),
            charset: env::var("WAYPOST_CHARSET").unwrap_or(defaults.charset),
            enabled: env::var("WAYPOST_API_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.enabled),
            jsonp_enabled: env::var("WAYPOST_JSONP_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.jsonp_enabled),
        }
    }

    /// Absolute URL for a route path, e.g. `/content/v1/articles/3`.
    #[must_use]
    pub fn route_url(&self, path: &str) -> String {
        let root = self.api_root.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{root}{path}")
        } else {
            format!("{root}/{path}")
        }
    }

    /// Path component of the API root, used to trim inbound request paths.
    /// Falls back to `/` when the root is not a parseable absolute URL.
    #[must_use]
    pub fn root_path(&self) -> String {
        match url::Url::parse(&self.api_root) {
            Ok(parsed) => {
                let path = parsed.path().trim_end_matches('/');
                if path.is_empty() {
                    "/".to_string()
                } else {
                    path.to_string()
                }
            }
            Err(_) => "/".to_string(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
