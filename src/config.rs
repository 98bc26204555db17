//! Client configuration

use std::env;

use crate::error::{Error, Result};

/// Default number of documents carried by one bulk write request
pub const DEFAULT_DOCS_PER_CONN: usize = 200;

/// Configuration options for the Frappe client
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the site (e.g. `https://erp.example.com`)
    pub url: String,
    /// API key; must be set together with `api_secret`
    pub api_key: Option<String>,
    /// API secret; must be set together with `api_key`
    pub api_secret: Option<String>,
    /// Verify the server certificate (default: true).
    /// When false, the client accepts any certificate.
    pub verify_ssl: bool,
    /// Request timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Maximum bulk sub-requests in flight at once, 0 for no limit (default: 100)
    pub max_concurrent_requests: usize,
    /// Documents per request for bulk writes (default: 200)
    pub docs_per_conn: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            api_key: None,
            api_secret: None,
            verify_ssl: true,
            timeout_ms: 30000,
            max_concurrent_requests: 100,
            docs_per_conn: DEFAULT_DOCS_PER_CONN,
        }
    }
}

// Keep the secret out of debug output.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("docs_per_conn", &self.docs_per_conn)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from `FRAPPE_*` environment variables.
    ///
    /// `FRAPPE_URL` is required. Numeric values that fail to parse fall back
    /// to their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let url = env::var("FRAPPE_URL")
            .map_err(|_| Error::Config("FRAPPE_URL environment variable must be set".to_string()))?;
        let api_key = env::var("FRAPPE_API_KEY").ok().filter(|s| !s.is_empty());
        let api_secret = env::var("FRAPPE_API_SECRET").ok().filter(|s| !s.is_empty());

        let verify_ssl = match env::var("FRAPPE_VERIFY_SSL") {
            Ok(s) => parse_bool(&s)
                .ok_or_else(|| Error::Config(format!("FRAPPE_VERIFY_SSL is not a boolean: {}", s)))?,
            Err(_) => defaults.verify_ssl,
        };

        let timeout_ms = env::var("FRAPPE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout_ms);

        let max_concurrent_requests = env::var("FRAPPE_MAX_CONCURRENT_REQUESTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_concurrent_requests);

        let docs_per_conn = env::var("FRAPPE_DOCS_PER_CONN")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.docs_per_conn);

        Ok(ClientConfig {
            url,
            api_key,
            api_secret,
            verify_ssl,
            timeout_ms,
            max_concurrent_requests,
            docs_per_conn,
        })
    }
}

/// Parse a boolean flag (true/false, 1/0, yes/no, on/off)
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
