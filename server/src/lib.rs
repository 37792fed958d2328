//! Inkhook - Notion webhook to PDF bridge.
//!
//! This library backs the `inkhook-web` binary: a webhook receiver
//! that turns Notion database automation events into rendered PDF
//! documents and hands them off downstream.
//!
//! ## Architecture
//!
//! ```text
//! Webhook → Verify → Normalize → (Enrich via Notion API) → Render → Deliver
//! ```

pub mod config;
pub mod deliver;
pub mod event;
pub mod normalize;
pub mod notion;
pub mod render;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use deliver::{Deliverer, DeliveryError};
pub use event::{CanonicalEvent, DeliveryReceipt, NotionEventPayload, RenderedDocument};
pub use normalize::{normalize, NormalizationError};
pub use notion::{NotionClient, NotionError};
pub use render::{RenderError, Renderer};
pub use web::{AppState, VerificationError};
