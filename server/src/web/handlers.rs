//! Webhook endpoint handlers.
//!
//! Each request walks the pipeline
//! `Received -> Verified -> Normalized -> Rendered -> Delivered ->
//! Responded`, with an enrichment step between normalize and render
//! when the event arrives without properties. The first failing stage
//! short-circuits to an error response; nothing is retried within a
//! single request.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::deliver::{Deliverer, DeliveryError};
use crate::event::DeliveryReceipt;
use crate::normalize::{normalize, NormalizationError};
use crate::notion::{NotionClient, NotionError};
use crate::render::{RenderError, Renderer};
use crate::web::signature::{self, VerificationError};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub notion: Option<Arc<NotionClient>>,
    pub renderer: Arc<Renderer>,
    pub deliverer: Arc<Deliverer>,
}

impl AppState {
    pub fn new(
        config: Config,
        notion: Option<NotionClient>,
        renderer: Renderer,
        deliverer: Deliverer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            notion: notion.map(Arc::new),
            renderer: Arc::new(renderer),
            deliverer: Arc::new(deliverer),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook/notion", post(notion_webhook))
        .with_state(state)
}

// =============================================================================
// Liveness
// =============================================================================

/// Plain-text liveness check.
pub async fn root() -> &'static str {
    "inkhook webhook bridge is running\n"
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Error mapping
// =============================================================================

/// Pipeline failure surfaced at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Enrichment(#[from] NotionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    /// Whether a retry with the same payload could succeed
    transient: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Verification(_) | ApiError::Normalization(_) => StatusCode::BAD_REQUEST,
            ApiError::Enrichment(_) => StatusCode::BAD_GATEWAY,
            ApiError::Render(RenderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Render(_) | ApiError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Verification(VerificationError::MissingSignature) => "MissingSignature",
            ApiError::Verification(VerificationError::InvalidSignature) => "InvalidSignature",
            ApiError::Verification(VerificationError::MalformedBody(_)) => "MalformedBody",
            ApiError::Normalization(NormalizationError::MissingField(_)) => "MissingField",
            ApiError::Enrichment(_) => "NotionUnavailable",
            ApiError::Render(RenderError::Timeout { .. }) => "RenderTimeout",
            ApiError::Render(_) => "TemplateError",
            ApiError::Delivery(_) => "DeliveryError",
        }
    }

    /// Transient failures may succeed on a later redelivery; permanent
    /// ones never will.
    pub fn transient(&self) -> bool {
        match self {
            ApiError::Verification(_) | ApiError::Normalization(_) => false,
            ApiError::Enrichment(_) => true,
            ApiError::Render(RenderError::Timeout { .. }) => true,
            ApiError::Render(_) => false,
            ApiError::Delivery(DeliveryError::SinkStatus { status }) => *status >= 500,
            ApiError::Delivery(DeliveryError::Client(_)) => false,
            ApiError::Delivery(_) => true,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            transient: self.transient(),
        };

        warn!(status = status.as_u16(), error = body.error, "webhook_error_response");

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Notion Webhook
// =============================================================================

/// Notion webhook endpoint.
pub async fn notion_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DeliveryReceipt>), ApiError> {
    info!(
        body_length = body.len(),
        has_signature = headers.contains_key(signature::SIGNATURE_HEADER),
        "webhook_received"
    );

    // Received -> Verified
    let payload = signature::verify(&headers, &body, state.config.webhook_token.as_deref())?;

    // Verified -> Normalized
    let mut event = normalize(payload)?;

    if let (Some(expected), Some(actual)) = (
        state.config.notion_database_id.as_deref(),
        event.database_id.as_deref(),
    ) {
        if expected != actual {
            warn!(
                event_id = %event.event_id,
                database_id = %actual,
                expected_database_id = %expected,
                "webhook_unexpected_database"
            );
        }
    }

    // Automation events may carry nothing but a page id; fetch the
    // page properties before rendering in that case.
    if event.properties.is_empty() {
        match &state.notion {
            Some(notion) => {
                event.properties = notion.fetch_page_properties(&event.page_id).await?;
            }
            None => {
                warn!(event_id = %event.event_id, "enrichment_skipped_no_api_key");
            }
        }
    }

    // Normalized -> Rendered (bounded by the render timeout)
    let document = state.renderer.render(&event).await?;

    // Rendered -> Delivered
    let receipt = state.deliverer.deliver(document).await?;

    info!(
        event_id = %receipt.event_id,
        duplicate = receipt.duplicate,
        destination = ?receipt.destination,
        "webhook_complete"
    );

    // Delivered -> Responded
    Ok((StatusCode::OK, Json(receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::template;
    use crate::web::signature::{compute_signature, format_signature_header, SIGNATURE_HEADER};
    use axum::http::HeaderValue;
    use std::path::PathBuf;
    use std::time::Duration;

    const TOKEN: &str = "test-webhook-token";
    const BODY: &[u8] =
        br#"{"eventId":"evt_1","pageId":"p1","databaseId":"d1","properties":{"title":"Hello"}}"#;

    fn temp_template(name: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("inkhook-web-{}-{}.pdf", name, std::process::id()));
        let mut doc = template::sample_template(&["title"]);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn test_state(name: &str, webhook_token: Option<&str>) -> AppState {
        let template_path = temp_template(name);
        let spool_dir = std::env::temp_dir().join(format!(
            "inkhook-web-spool-{}-{}",
            name,
            std::process::id()
        ));

        let config = Config {
            port: 0,
            notion_api_key: None,
            notion_database_id: Some("d1".to_string()),
            webhook_token: webhook_token.map(String::from),
            template_path: template_path.display().to_string(),
            render_timeout_ms: 5000,
            request_timeout_ms: 1000,
            delivery_sink_url: None,
            spool_dir: spool_dir.display().to_string(),
            seen_events_capacity: 8,
        };

        let renderer = Renderer::new(&config.template_path, Duration::from_secs(5));
        let deliverer = Deliverer::new(
            None,
            &config.spool_dir,
            Duration::from_secs(1),
            config.seen_events_capacity,
        )
        .unwrap();

        AppState::new(config, None, renderer, deliverer)
    }

    fn signed_headers(body: &[u8], token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format_signature_header(&compute_signature(body, token.as_bytes()));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_signed_webhook_returns_receipt() {
        let state = test_state("ok", Some(TOKEN));

        let (status, Json(receipt)) = notion_webhook(
            State(state),
            signed_headers(BODY, TOKEN),
            Bytes::from_static(BODY),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt.event_id, "evt_1");
        assert!(!receipt.duplicate);
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let state = test_state("nosig", Some(TOKEN));

        let err = notion_webhook(State(state), HeaderMap::new(), Bytes::from_static(BODY))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Verification(VerificationError::MissingSignature)
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "MissingSignature");
    }

    #[tokio::test]
    async fn test_missing_page_id_is_rejected() {
        let state = test_state("nopage", Some(TOKEN));
        let body = br#"{"eventId":"evt_1","properties":{"title":"x"}}"#;

        let err = notion_webhook(
            State(state),
            signed_headers(body, TOKEN),
            Bytes::from_static(body),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Normalization(NormalizationError::MissingField("pageId"))
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_reports_duplicate_receipt() {
        let state = test_state("dup", Some(TOKEN));

        let (_, Json(first)) = notion_webhook(
            State(state.clone()),
            signed_headers(BODY, TOKEN),
            Bytes::from_static(BODY),
        )
        .await
        .unwrap();

        let (_, Json(second)) = notion_webhook(
            State(state),
            signed_headers(BODY, TOKEN),
            Bytes::from_static(BODY),
        )
        .await
        .unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
    }

    #[test]
    fn test_error_status_mapping() {
        let timeout = ApiError::Render(RenderError::Timeout { timeout_ms: 30_000 });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.code(), "RenderTimeout");
        assert!(timeout.transient());

        let template = ApiError::Render(RenderError::Template("bad".to_string()));
        assert_eq!(template.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!template.transient());

        let invalid = ApiError::Verification(VerificationError::InvalidSignature);
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert!(!invalid.transient());

        let sink_server = ApiError::Delivery(DeliveryError::SinkStatus { status: 503 });
        assert!(sink_server.transient());
        let sink_client = ApiError::Delivery(DeliveryError::SinkStatus { status: 404 });
        assert!(!sink_client.transient());
    }

    #[test]
    fn test_build_router() {
        let state = test_state("router", None);
        let _router = build_router(state);
    }
}
