//! Document delivery.
//!
//! One hand-off attempt per rendered document: an HTTP POST to the
//! configured sink, or a write into the local spool directory when no
//! sink is set. Retry policy belongs to the caller, not here.
//!
//! Repeated deliveries of the same event id are detected through a
//! bounded in-memory set of recently seen ids and answered with a
//! duplicate receipt instead of a second hand-off.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::{info, warn};

use crate::event::{DeliveryReceipt, RenderedDocument};

/// Reasons a hand-off fails.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The sink HTTP client could not be constructed.
    #[error("failed to build sink client: {0}")]
    Client(reqwest::Error),

    /// The sink request failed (connect, timeout). Transient.
    #[error("sink request failed: {0}")]
    SinkRequest(#[from] reqwest::Error),

    /// The sink answered with a non-success status.
    #[error("sink returned status {status}")]
    SinkStatus {
        /// HTTP status code returned by the sink
        status: u16,
    },

    /// The spool directory or file could not be written.
    #[error("spool write failed: {0}")]
    Spool(#[from] std::io::Error),
}

/// Hands rendered documents off downstream, exactly once per event id.
pub struct Deliverer {
    http: Client,
    sink_url: Option<String>,
    spool_dir: PathBuf,
    seen: Mutex<SeenEvents>,
}

impl Deliverer {
    pub fn new(
        sink_url: Option<String>,
        spool_dir: impl Into<PathBuf>,
        request_timeout: Duration,
        seen_capacity: usize,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(DeliveryError::Client)?;

        Ok(Self {
            http,
            sink_url,
            spool_dir: spool_dir.into(),
            seen: Mutex::new(SeenEvents::new(seen_capacity)),
        })
    }

    /// Deliver a document, or report a duplicate without side effects.
    pub async fn deliver(&self, doc: RenderedDocument) -> Result<DeliveryReceipt, DeliveryError> {
        let event_id = doc.source_event_id.clone();

        {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(&event_id) {
                info!(event_id = %event_id, "delivery_duplicate_skipped");
                return Ok(DeliveryReceipt {
                    event_id,
                    destination: None,
                    delivered_at: Utc::now(),
                    duplicate: true,
                });
            }
        }

        match self.hand_off(&doc).await {
            Ok(destination) => {
                info!(
                    event_id = %event_id,
                    destination = %destination,
                    byte_count = doc.bytes.len(),
                    "delivery_complete"
                );
                Ok(DeliveryReceipt {
                    event_id,
                    destination: Some(destination),
                    delivered_at: Utc::now(),
                    duplicate: false,
                })
            }
            Err(e) => {
                // A failed hand-off releases the reservation so a
                // redelivery of the same event can succeed.
                let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
                seen.remove(&event_id);
                warn!(event_id = %event_id, error = %e, "delivery_failed");
                Err(e)
            }
        }
    }

    async fn hand_off(&self, doc: &RenderedDocument) -> Result<String, DeliveryError> {
        match &self.sink_url {
            Some(sink) => self.forward(doc, sink).await,
            None => self.spool(doc).await,
        }
    }

    /// POST the document to the configured sink.
    async fn forward(&self, doc: &RenderedDocument, sink: &str) -> Result<String, DeliveryError> {
        let response = self
            .http
            .post(sink)
            .header(header::CONTENT_TYPE, "application/pdf")
            .header("X-Event-Id", doc.source_event_id.as_str())
            .body(doc.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::SinkStatus {
                status: status.as_u16(),
            });
        }

        Ok(sink.to_string())
    }

    /// Write the document into the spool directory.
    async fn spool(&self, doc: &RenderedDocument) -> Result<String, DeliveryError> {
        tokio::fs::create_dir_all(&self.spool_dir).await?;

        let file_name = format!("{}.pdf", sanitize_file_name(&doc.source_event_id));
        let path = self.spool_dir.join(file_name);

        tokio::fs::write(&path, &doc.bytes).await?;

        Ok(path.display().to_string())
    }
}

/// Event ids come from the wire; keep them path-safe.
fn sanitize_file_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Insert-ordered set of recently seen event ids with bounded size.
struct SeenEvents {
    capacity: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenEvents {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record an id. Returns false when it was already present.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }

        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }

        true
    }

    fn remove(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.order.retain(|seen| seen != id);
        }
    }
}
