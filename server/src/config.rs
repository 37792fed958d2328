//! Configuration module for environment variable parsing.
//!
//! All configuration is read once at startup; the resulting struct is
//! immutable and shared behind an `Arc` for the lifetime of the process.

use std::env;

use tracing::warn;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Notion integration API key; enrichment is disabled without it
    pub notion_api_key: Option<String>,

    /// Database id events are expected to originate from
    pub notion_database_id: Option<String>,

    /// Webhook verification token for HMAC signature checks
    pub webhook_token: Option<String>,

    /// Path to the AcroForm PDF template
    pub template_path: String,

    /// Upper bound on a single render in milliseconds
    pub render_timeout_ms: u64,

    /// HTTP request timeout in milliseconds (Notion API and sink)
    pub request_timeout_ms: u64,

    /// Optional HTTP sink documents are forwarded to
    pub delivery_sink_url: Option<String>,

    /// Directory documents are spooled to when no sink is configured
    pub spool_dir: String,

    /// Maximum number of recently seen event ids kept for idempotency
    pub seen_events_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),

            notion_api_key: non_empty("NOTION_API_KEY"),

            notion_database_id: non_empty("NOTION_DATABASE_ID"),

            webhook_token: non_empty("NOTION_WEBHOOK_TOKEN"),

            template_path: env::var("PDF_TEMPLATE_PATH")
                .unwrap_or_else(|_| "templates/report.pdf".to_string()),

            render_timeout_ms: env::var("RENDER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            delivery_sink_url: parse_url("DELIVERY_SINK_URL"),

            spool_dir: env::var("DELIVERY_SPOOL_DIR").unwrap_or_else(|_| "spool".to_string()),

            seen_events_capacity: env::var("SEEN_EVENTS_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        }
    }
}

/// Read a variable, treating empty or whitespace-only values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and validate an absolute URL, discarding unparseable values.
fn parse_url(name: &str) -> Option<String> {
    let raw = non_empty(name)?;

    match Url::parse(&raw) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            warn!(env_var = name, value = %raw, error = %e, "Invalid URL, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_trims_and_filters() {
        env::set_var("TEST_NON_EMPTY", "  value  ");
        assert_eq!(non_empty("TEST_NON_EMPTY"), Some("value".to_string()));
        env::set_var("TEST_NON_EMPTY", "   ");
        assert_eq!(non_empty("TEST_NON_EMPTY"), None);
        env::remove_var("TEST_NON_EMPTY");
    }

    #[test]
    fn test_non_empty_missing_var() {
        assert_eq!(non_empty("NONEXISTENT_VAR_XYZ"), None);
    }

    #[test]
    fn test_parse_url_valid() {
        env::set_var("TEST_SINK_URL", "https://sink.example.com/documents");
        let result = parse_url("TEST_SINK_URL");
        assert_eq!(result, Some("https://sink.example.com/documents".to_string()));
        env::remove_var("TEST_SINK_URL");
    }

    #[test]
    fn test_parse_url_invalid() {
        env::set_var("TEST_BAD_URL", "not a url");
        assert_eq!(parse_url("TEST_BAD_URL"), None);
        env::remove_var("TEST_BAD_URL");
    }
}
