//! Event normalization.
//!
//! Maps the provider wire payload into a `CanonicalEvent`, enforcing
//! the required-field policy: `eventId` and `pageId` must be present
//! and non-empty, unknown fields are ignored, and properties with
//! empty keys are dropped.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::event::{CanonicalEvent, NotionEventPayload};

/// Reasons a payload cannot be normalized.
///
/// Permanent failures; map to a 400 response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    /// A required field is absent or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Normalize a verified payload into a canonical event.
pub fn normalize(payload: NotionEventPayload) -> Result<CanonicalEvent, NormalizationError> {
    let event_id = payload
        .event_id
        .filter(|v| !v.is_empty())
        .ok_or(NormalizationError::MissingField("eventId"))?;

    let page_id = payload
        .page_id
        .filter(|v| !v.is_empty())
        .ok_or(NormalizationError::MissingField("pageId"))?;

    let database_id = payload.database_id.filter(|v| !v.is_empty());

    // Property keys must be non-empty strings
    let properties: std::collections::BTreeMap<_, _> = payload
        .properties
        .into_iter()
        .filter(|(key, _)| !key.is_empty())
        .collect();

    info!(
        event_id = %event_id,
        page_id = %page_id,
        database_id = ?database_id,
        property_count = properties.len(),
        "event_normalized"
    );

    Ok(CanonicalEvent {
        event_id,
        database_id,
        page_id,
        properties,
        received_at: Utc::now(),
    })
}
