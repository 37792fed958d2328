//! Notion API client for page enrichment.
//!
//! Automation events often arrive with nothing but a page id. When an
//! event carries no properties, the endpoint layer fetches the page
//! from the Notion REST API and flattens its typed property objects
//! (title, rich_text, number, select, …) into plain values the
//! renderer can fill into a template.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{header, Client};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Base URL of the Notion REST API.
pub const NOTION_API_BASE: &str = "https://api.notion.com";

/// API version pinned via the `Notion-Version` header.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Failures talking to the Notion API.
///
/// Transient from the pipeline's point of view; map to a 502 response.
#[derive(Debug, Error)]
pub enum NotionError {
    /// The API key cannot be used as an `Authorization` header value.
    #[error("API key is not a valid header value")]
    InvalidApiKey,

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),

    /// The request itself failed (connect, timeout, decode).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Notion API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response parsed but is not shaped like a page.
    #[error("unexpected response shape: {0}")]
    Shape(&'static str),
}

/// Thin client over the Notion REST API.
pub struct NotionClient {
    http: Client,
    base_url: String,
}

impl NotionClient {
    /// Build a client with the Notion default headers.
    ///
    /// The `Authorization` header is marked sensitive so it never shows
    /// up in logs.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, NotionError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| NotionError::InvalidApiKey)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert("Notion-Version", header::HeaderValue::from_static(NOTION_VERSION));
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(NotionError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: NOTION_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API base URL (local stand-ins).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch a page and flatten its properties into plain values.
    pub async fn fetch_page_properties(
        &self,
        page_id: &str,
    ) -> Result<BTreeMap<String, Value>, NotionError> {
        let url = format!("{}/v1/pages/{}", self.base_url, page_id);

        info!(page_id = %page_id, "notion_page_fetch_start");

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            warn!(page_id = %page_id, status = status, "notion_page_fetch_failed");
            return Err(NotionError::Status { status, body });
        }

        let page: Value = response.json().await?;

        let raw = page
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(NotionError::Shape("page response has no properties object"))?;

        let properties = flatten_properties(raw);

        info!(
            page_id = %page_id,
            property_count = properties.len(),
            "notion_page_fetch_complete"
        );

        Ok(properties)
    }
}

/// Flatten Notion's typed property objects into plain values.
///
/// Properties of unsupported types (files, relations, people, …) are
/// skipped rather than rejected.
pub fn flatten_properties(raw: &serde_json::Map<String, Value>) -> BTreeMap<String, Value> {
    raw.iter()
        .filter_map(|(name, prop)| flatten_property(prop).map(|v| (name.clone(), v)))
        .collect()
}

/// Reduce a single typed property object to a plain value.
fn flatten_property(prop: &Value) -> Option<Value> {
    let kind = prop.get("type")?.as_str()?;

    let value = match kind {
        "title" | "rich_text" => Value::String(plain_text(prop.get(kind)?)),
        "number" => prop.get("number")?.clone(),
        "checkbox" => prop.get("checkbox")?.clone(),
        "url" | "email" | "phone_number" => prop.get(kind)?.clone(),
        "select" => prop.get("select")?.get("name")?.clone(),
        "status" => prop.get("status")?.get("name")?.clone(),
        "date" => prop.get("date")?.get("start")?.clone(),
        "multi_select" => {
            let names: Vec<&str> = prop
                .get("multi_select")?
                .as_array()?
                .iter()
                .filter_map(|opt| opt.get("name").and_then(Value::as_str))
                .collect();
            Value::String(names.join(", "))
        }
        "formula" => {
            let formula = prop.get("formula")?;
            let inner = formula.get("type")?.as_str()?;
            formula.get(inner)?.clone()
        }
        _ => return None,
    };

    if value.is_null() {
        return None;
    }

    Some(value)
}

/// Concatenate the `plain_text` segments of a rich text array.
fn plain_text(segments: &Value) -> String {
    segments
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_title_property() {
        let prop = json!({
            "id": "title",
            "type": "title",
            "title": [
                {"type": "text", "plain_text": "Hello "},
                {"type": "text", "plain_text": "World"}
            ]
        });

        assert_eq!(flatten_property(&prop), Some(json!("Hello World")));
    }

    #[test]
    fn test_flatten_rich_text_property() {
        let prop = json!({
            "type": "rich_text",
            "rich_text": [{"type": "text", "plain_text": "notes here"}]
        });

        assert_eq!(flatten_property(&prop), Some(json!("notes here")));
    }

    #[test]
    fn test_flatten_number_property() {
        let prop = json!({"type": "number", "number": 7.5});
        assert_eq!(flatten_property(&prop), Some(json!(7.5)));
    }

    #[test]
    fn test_flatten_null_number_skipped() {
        let prop = json!({"type": "number", "number": null});
        assert_eq!(flatten_property(&prop), None);
    }

    #[test]
    fn test_flatten_select_property() {
        let prop = json!({
            "type": "select",
            "select": {"id": "x", "name": "Office", "color": "blue"}
        });

        assert_eq!(flatten_property(&prop), Some(json!("Office")));
    }

    #[test]
    fn test_flatten_multi_select_property() {
        let prop = json!({
            "type": "multi_select",
            "multi_select": [{"name": "a"}, {"name": "b"}]
        });

        assert_eq!(flatten_property(&prop), Some(json!("a, b")));
    }

    #[test]
    fn test_flatten_date_property() {
        let prop = json!({
            "type": "date",
            "date": {"start": "2025-06-09", "end": null, "time_zone": null}
        });

        assert_eq!(flatten_property(&prop), Some(json!("2025-06-09")));
    }

    #[test]
    fn test_flatten_formula_number() {
        let prop = json!({
            "type": "formula",
            "formula": {"type": "number", "number": 12.0}
        });

        assert_eq!(flatten_property(&prop), Some(json!(12.0)));
    }

    #[test]
    fn test_flatten_checkbox_property() {
        let prop = json!({"type": "checkbox", "checkbox": true});
        assert_eq!(flatten_property(&prop), Some(json!(true)));
    }

    #[test]
    fn test_flatten_unknown_type_skipped() {
        let prop = json!({"type": "relation", "relation": [{"id": "abc"}]});
        assert_eq!(flatten_property(&prop), None);
    }

    /// Serve a fixed response from an ephemeral local port.
    async fn local_api(response: Value, status: axum::http::StatusCode) -> String {
        use axum::{routing::get, Json, Router};

        let app = Router::new().route(
            "/v1/pages/:id",
            get(move || async move { (status, Json(response)) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_page_properties_flattens_response() {
        let page = json!({
            "object": "page",
            "id": "p1",
            "properties": {
                "title": {"type": "title", "title": [{"plain_text": "Report"}]},
                "hours": {"type": "number", "number": 8}
            }
        });
        let base = local_api(page, axum::http::StatusCode::OK).await;

        let client = NotionClient::new("secret-key", Duration::from_secs(1))
            .unwrap()
            .with_base_url(base);

        let properties = client.fetch_page_properties("p1").await.unwrap();

        assert_eq!(properties["title"], json!("Report"));
        assert_eq!(properties["hours"], json!(8));
    }

    #[tokio::test]
    async fn test_fetch_page_properties_surfaces_api_status() {
        let base = local_api(
            json!({"object": "error", "status": 404}),
            axum::http::StatusCode::NOT_FOUND,
        )
        .await;

        let client = NotionClient::new("secret-key", Duration::from_secs(1))
            .unwrap()
            .with_base_url(base);

        let err = client.fetch_page_properties("missing").await.unwrap_err();
        assert!(matches!(err, NotionError::Status { status: 404, .. }));
    }

    #[test]
    fn test_flatten_properties_map() {
        let page = json!({
            "title": {"type": "title", "title": [{"plain_text": "Report"}]},
            "hours": {"type": "number", "number": 8},
            "files": {"type": "files", "files": []}
        });

        let flat = flatten_properties(page.as_object().unwrap());

        assert_eq!(flat.len(), 2);
        assert_eq!(flat["title"], json!("Report"));
        assert_eq!(flat["hours"], json!(8));
    }
}
