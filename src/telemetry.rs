//! Telemetry and structured logging for the export service.

use crate::job::{ConversionJob, JobStatus};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use std::time::Duration;
use tracing::{debug, info, warn};

const TRACER_NAME: &str = "page-export";

/// Records telemetry for a finished conversion.
///
/// Emits a structured log line and an OpenTelemetry span carrying:
/// - conversion duration (ms)
/// - mode and final status
/// - output size, or the error text if the conversion failed
///
/// Conversions that overrun `budget` are logged as warnings; the budget
/// itself is enforced by the hosting platform.
pub fn record_conversion_telemetry(job: &ConversionJob, budget: Duration) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("pdf_conversion");

    span.set_attribute(KeyValue::new("job_id", job.job_id.clone()));
    span.set_attribute(KeyValue::new("mode", job.mode.to_string()));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.job_id,
            mode = %job.mode,
            duration_ms = duration_ms,
            status = %job.status,
            "PDF conversion finished"
        );

        let budget_ms = budget.as_millis() as i64;
        if duration_ms > budget_ms {
            warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                budget_ms = budget_ms,
                "PDF conversion exceeded request budget"
            );
        }
    }

    if let Some(bytes) = job.output_bytes {
        span.set_attribute(KeyValue::new("output_bytes", bytes as i64));
    }

    if job.status == JobStatus::Failed {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
            warn!(
                job_id = %job.job_id,
                target = %job.target,
                error = %error,
                "PDF conversion failed"
            );
        }
    }

    if let Ok(record) = serde_json::to_string(job) {
        debug!(job = %record, "Conversion record");
    }

    span.end();
}

/// Installs the global `tracing` subscriber.
///
/// Filter comes from `RUST_LOG` (default: info). Set `LOG_FORMAT=json` for
/// machine-readable output.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initializes OpenTelemetry with an OTLP exporter pointed at `endpoint`.
///
/// Call once at startup from within the Tokio runtime. The service name
/// comes from `OTEL_SERVICE_NAME` (default: page-export).
pub fn init_telemetry(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let service_name = std::env::var("OTEL_SERVICE_NAME")
        .unwrap_or_else(|_| TRACER_NAME.to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

/// Flushes pending spans before exit.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
