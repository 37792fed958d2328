//! Inkhook Web Server - Notion webhook receiver.
//!
//! This binary runs the webhook bridge:
//! - Receives Notion database automation events
//! - Verifies signatures, normalizes, and renders a PDF per event
//! - Hands the document off to the configured sink or spool

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inkhook::web::{build_router, AppState};
use inkhook::{Config, Deliverer, NotionClient, Renderer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        signature_verification = config.webhook_token.is_some(),
        notion_api_configured = config.notion_api_key.is_some(),
        template_path = %config.template_path,
        render_timeout_ms = config.render_timeout_ms,
        delivery_sink = ?config.delivery_sink_url,
        "config_loaded"
    );

    let request_timeout = Duration::from_millis(config.request_timeout_ms);

    // Notion client is optional; without it, events that arrive with no
    // properties render against an empty property set.
    let notion = match &config.notion_api_key {
        Some(key) => Some(
            NotionClient::new(key, request_timeout).context("Failed to build Notion client")?,
        ),
        None => {
            warn!("notion_api_key_not_configured");
            None
        }
    };

    let renderer = Renderer::new(
        &config.template_path,
        Duration::from_millis(config.render_timeout_ms),
    );

    let deliverer = Deliverer::new(
        config.delivery_sink_url.clone(),
        &config.spool_dir,
        request_timeout,
        config.seen_events_capacity,
    )
    .context("Failed to build deliverer")?;

    let port = config.port;
    let state = AppState::new(config, notion, renderer, deliverer);

    // Build the router
    let app = build_router(state).layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
