//! Web server module for handling inbound webhooks.
//!
//! This module provides the HTTP boundary of the pipeline:
//! - Verifies webhook signatures before anything is parsed
//! - Drives verify → normalize → render → deliver per request
//! - Converts every pipeline failure into a status + JSON error body

pub mod handlers;
pub mod signature;

pub use handlers::{build_router, health, notion_webhook, root, ApiError, AppState, HealthResponse};
pub use signature::{
    is_signature_verification_enabled, verify, VerificationError, SIGNATURE_HEADER,
};
