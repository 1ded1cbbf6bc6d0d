//! Logging subscriber setup.
//!
//! Configures structured logging with:
//! - Environment-based filter (via RUST_LOG)
//! - Console output with target, file and line
//! - An OpenTelemetry layer so request spans reach the trace exporter

use opentelemetry_sdk::trace::Tracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::TelemetryError;

/// Crates whose own spans would feed back into the exporter or add noise.
const QUIET_TARGETS: &str = "h2=off,hyper=warn,hyper_util=warn,tonic=warn,tower=warn";

/// Build the filter from a RUST_LOG-style directive string.
fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("{log_level},{QUIET_TARGETS}"))
        .unwrap_or_else(|_| EnvFilter::new(format!("info,backend_api=debug,{QUIET_TARGETS}")))
}

/// Initialize logging, bridging `tracing` spans into `tracer` when given.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(log_level: &str, tracer: Option<Tracer>) -> Result<(), TelemetryError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(build_filter(log_level))
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    tracing::info!(log_level, "Tracing initialized");
    Ok(())
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
