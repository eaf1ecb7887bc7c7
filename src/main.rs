//! Page Export Service
//!
//! Serves the URL and HTML to PDF endpoints over HTTP. Each request launches
//! its own headless Chrome, renders, prints and tears it down again.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `BIND_ADDR`: listen address (default: 0.0.0.0:3000)
//! - `RUNTIME_PROFILE`: `constrained` or `general` (default: detected)
//! - `APP_STAGE`: `production`, `preview` or `development` (default: production)
//! - `CHROME_PATH`: browser executable (required when constrained)
//! - `LOAD_TIMEOUT_MS`: content-load timeout (default: 30000)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, Result};
use page_export::browser::launcher_for;
use page_export::config::ServiceConfig;
use page_export::converter::PdfConverter;
use page_export::server::{router, AppState};
use page_export::telemetry;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = ServiceConfig::from_env();

    if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        if let Err(e) = telemetry::init_telemetry(endpoint) {
            warn!("Failed to initialize telemetry: {}", e);
        }
    }

    info!(
        bind_addr = %config.bind_addr,
        profile = ?config.profile,
        stage = ?config.stage,
        load_timeout_ms = config.load_timeout.as_millis() as u64,
        "Starting page export service"
    );

    let launcher = launcher_for(&config).context("Failed to configure browser launcher")?;
    let converter = PdfConverter::from_config(launcher, &config);
    let app = router(AppState::new(converter, &config), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!("Service ready, press Ctrl+C to shutdown");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    telemetry::shutdown_telemetry();
    info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, draining in-flight conversions...");
}
