//! Pipeline data types for the webhook-to-document flow.
//!
//! This module defines the shapes that move through the pipeline:
//! - `NotionEventPayload`: the verified wire payload as Notion sends it
//! - `CanonicalEvent`: the normalized internal event
//! - `RenderedDocument`: the PDF produced from an event
//! - `DeliveryReceipt`: confirmation returned to the webhook caller

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Verified webhook payload in Notion's wire shape.
///
/// Deserialized from the raw request body after signature verification.
/// Unknown fields are ignored; required-field policy is enforced by the
/// normalizer, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionEventPayload {
    /// Unique delivery identifier assigned by the provider
    #[serde(default, rename = "eventId")]
    pub event_id: Option<String>,
    /// Database the triggering page belongs to
    #[serde(default, rename = "databaseId")]
    pub database_id: Option<String>,
    /// Page that triggered the automation
    #[serde(default, rename = "pageId")]
    pub page_id: Option<String>,
    /// Page properties included with the event, possibly empty
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Normalized internal event, decoupled from the provider schema.
///
/// Property iteration order is deterministic (`BTreeMap`) so that
/// rendering the same event twice produces identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Unique per delivery; never empty after normalization
    pub event_id: String,
    /// Absent when the automation payload does not carry it
    pub database_id: Option<String>,
    pub page_id: String,
    /// Keys are non-empty after normalization
    pub properties: BTreeMap<String, Value>,
    pub received_at: DateTime<Utc>,
}

/// A rendered PDF, owned by the deliverer until handed off.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Event this document was rendered from
    pub source_event_id: String,
    /// PDF file content
    pub bytes: Vec<u8>,
    pub generated_at: DateTime<Utc>,
}

/// Confirmation that a document was handed off downstream.
///
/// Serialized as the 200 response body of the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Event the delivered document was rendered from
    pub event_id: String,
    /// Sink URL or spool path; absent for duplicate no-ops
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub delivered_at: DateTime<Utc>,
    /// True when the event id was already delivered and no hand-off ran
    pub duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_deserializes_wire_shape() {
        let body = r#"{"eventId":"evt_1","pageId":"p1","databaseId":"d1","properties":{"title":"Hello"}}"#;
        let payload: NotionEventPayload = serde_json::from_str(body).unwrap();

        assert_eq!(payload.event_id.as_deref(), Some("evt_1"));
        assert_eq!(payload.page_id.as_deref(), Some("p1"));
        assert_eq!(payload.database_id.as_deref(), Some("d1"));
        assert_eq!(payload.properties["title"], Value::String("Hello".to_string()));
    }

    #[test]
    fn test_payload_tolerates_missing_fields() {
        let payload: NotionEventPayload = serde_json::from_str("{}").unwrap();

        assert!(payload.event_id.is_none());
        assert!(payload.page_id.is_none());
        assert!(payload.properties.is_empty());
    }

    #[test]
    fn test_payload_ignores_unknown_fields() {
        let body = r#"{"eventId":"evt_2","pageId":"p2","attempt":3,"source":{"type":"automation"}}"#;
        let payload: NotionEventPayload = serde_json::from_str(body).unwrap();

        assert_eq!(payload.event_id.as_deref(), Some("evt_2"));
    }

    #[test]
    fn test_receipt_serialization_skips_empty_destination() {
        let receipt = DeliveryReceipt {
            event_id: "evt_1".to_string(),
            destination: None,
            delivered_at: Utc::now(),
            duplicate: true,
        };

        let json = serde_json::to_string(&receipt).unwrap();
        assert!(!json.contains("destination"));
        assert!(json.contains("\"duplicate\":true"));
    }
}
