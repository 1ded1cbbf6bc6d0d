//! OTLP span export (the push sink).
//!
//! Spans are batched in memory and shipped over gRPC to the collector by the
//! SDK's batch processor. The exporter connects lazily, so an unreachable
//! collector shows up as export errors later, never as a startup failure.
//! Installing logs nothing: the subscriber is set up afterwards.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::global;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::{Config as TraceConfig, Tracer, TracerProvider};
use std::time::Duration;
use tokio::sync::oneshot;

use super::resource::ResourceIdentity;
use super::TelemetryError;

/// Per-request timeout for a single OTLP export call.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a shutdown flush ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed,
    Failed(String),
    TimedOut,
}

/// Owner of the tracer provider and its export pipeline.
pub struct PushSink {
    provider: TracerProvider,
    instrumentation_scope: String,
}

impl PushSink {
    /// Build the OTLP/gRPC batch pipeline and register it as the global provider.
    pub fn install(endpoint: &str, identity: &ResourceIdentity) -> Result<Self, TelemetryError> {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .with_protocol(Protocol::Grpc)
            .with_timeout(EXPORT_TIMEOUT);

        let provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(TraceConfig::default().with_resource(identity.to_resource()))
            .install_batch(runtime::Tokio)?;

        global::set_tracer_provider(provider.clone());

        Ok(Self::from_provider(provider, identity.service_name()))
    }

    /// Wrap an already-built provider (tests use an in-memory exporter).
    pub fn from_provider(provider: TracerProvider, instrumentation_scope: &str) -> Self {
        Self {
            provider,
            instrumentation_scope: instrumentation_scope.to_string(),
        }
    }

    /// Tracer for the service's own instrumentation scope.
    pub fn tracer(&self) -> Tracer {
        self.provider.tracer(self.instrumentation_scope.clone())
    }

    /// Flush buffered spans and release the exporter, bounded by `timeout`.
    ///
    /// The flush runs on a detached thread rather than the blocking pool, so a
    /// stalled exporter is abandoned at `timeout` and cannot hold runtime
    /// teardown or process exit. Never fails: the outcome is logged and
    /// returned for inspection.
    pub async fn shutdown(self, timeout: Duration) -> FlushOutcome {
        let provider = self.provider;
        let (done_tx, done_rx) = oneshot::channel();

        let spawned = std::thread::Builder::new()
            .name("otel-flush".to_string())
            .spawn(move || {
                let _ = done_tx.send(provider.shutdown());
            });

        let outcome = match spawned {
            Err(e) => FlushOutcome::Failed(e.to_string()),
            Ok(_) => match tokio::time::timeout(timeout, done_rx).await {
                Ok(Ok(Ok(()))) => FlushOutcome::Flushed,
                Ok(Ok(Err(e))) => FlushOutcome::Failed(e.to_string()),
                Ok(Err(_)) => FlushOutcome::Failed("flush thread exited early".to_string()),
                Err(_) => FlushOutcome::TimedOut,
            },
        };

        match &outcome {
            FlushOutcome::Flushed => tracing::info!("Trace provider shut down cleanly"),
            FlushOutcome::Failed(error) => {
                tracing::error!(error = %error, "Error during trace provider shutdown");
            }
            FlushOutcome::TimedOut => {
                tracing::error!(timeout_ms = timeout.as_millis() as u64, "Trace flush timed out");
            }
        }
        outcome
    }
}
