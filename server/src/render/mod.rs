//! Document rendering.
//!
//! Turns a canonical event into a PDF by filling the configured
//! AcroForm template with the event's properties. The fill runs on the
//! blocking pool and is bounded by a timeout; a render that exceeds it
//! is abandoned and reported, never retried here.

pub mod template;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info};

use crate::event::{CanonicalEvent, RenderedDocument};

/// Reasons rendering fails.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template cannot be loaded, parsed, or serialized. Permanent;
    /// maps to a 500 response.
    #[error("template error: {0}")]
    Template(String),

    /// The render ran past its deadline. Transient; maps to 504.
    #[error("rendering exceeded {timeout_ms}ms")]
    Timeout {
        /// The limit that was exceeded
        timeout_ms: u64,
    },
}

/// Renders canonical events against a fixed template.
#[derive(Debug, Clone)]
pub struct Renderer {
    template_path: PathBuf,
    render_timeout: Duration,
}

impl Renderer {
    pub fn new(template_path: impl Into<PathBuf>, render_timeout: Duration) -> Self {
        Self {
            template_path: template_path.into(),
            render_timeout,
        }
    }

    /// Render an event into a PDF document.
    pub async fn render(&self, event: &CanonicalEvent) -> Result<RenderedDocument, RenderError> {
        let path = self.template_path.clone();
        let properties = event.properties.clone();

        self.render_with(event, move || template::fill_template(&path, &properties))
            .await
    }

    /// Run a fill closure on the blocking pool under the render timeout.
    async fn render_with<F>(
        &self,
        event: &CanonicalEvent,
        fill: F,
    ) -> Result<RenderedDocument, RenderError>
    where
        F: FnOnce() -> Result<Vec<u8>, RenderError> + Send + 'static,
    {
        let timeout_ms = self.render_timeout.as_millis() as u64;
        let task = tokio::task::spawn_blocking(fill);

        let bytes = match timeout(self.render_timeout, task).await {
            // The blocking task keeps running but its result is dropped
            Err(_) => {
                error!(
                    event_id = %event.event_id,
                    timeout_ms = timeout_ms,
                    "render_timeout"
                );
                return Err(RenderError::Timeout { timeout_ms });
            }
            Ok(Err(join_err)) => {
                return Err(RenderError::Template(format!(
                    "render task failed: {}",
                    join_err
                )))
            }
            Ok(Ok(result)) => result?,
        };

        info!(
            event_id = %event.event_id,
            byte_count = bytes.len(),
            "render_complete"
        );

        Ok(RenderedDocument {
            source_event_id: event.event_id.clone(),
            bytes,
            generated_at: Utc::now(),
        })
    }
}
