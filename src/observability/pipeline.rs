//! Telemetry bootstrap and shutdown.
//!
//! Composes the two export sinks behind one owner:
//!
//! ```text
//! Telemetry::bootstrap
//!     → ResourceIdentity (service name/version, fixed for the process)
//!     → PushSink (OTLP batch exporter, global provider)
//!     → logging subscriber bridged to the PushSink tracer, error handler
//!     → Metrics registry → PullSink (dedicated scrape listener)
//!
//! Telemetry::shutdown
//!     → PullSink stops accepting scrapes
//!     → PushSink flushes within the timeout
//! ```
//!
//! The sinks share nothing but the resource identity; a slow collector never
//! stalls a scrape and a scrape never waits on the collector.

use opentelemetry::global;
use opentelemetry_sdk::trace::Tracer;
use std::sync::Arc;
use std::time::Duration;

use super::metrics::Metrics;
use super::otlp::{FlushOutcome, PushSink};
use super::prometheus::PullSink;
use super::resource::ResourceIdentity;
use super::tracing::init_tracing;
use super::TelemetryError;
use crate::config::Config;

/// Route SDK export errors into the log instead of stderr.
fn install_error_handler() -> Result<(), global::Error> {
    global::set_error_handler(|err| {
        tracing::warn!(error = %err, "OpenTelemetry export error");
    })
}

/// Running telemetry stack. Create once, before the HTTP listener binds.
pub struct Telemetry {
    identity: ResourceIdentity,
    metrics: Arc<Metrics>,
    push: PushSink,
    pull: PullSink,
}

impl Telemetry {
    /// Start both sinks and install the logging subscriber.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: the service must not serve uninstrumented.
    pub async fn bootstrap(config: &Config) -> Result<Self, TelemetryError> {
        let identity = ResourceIdentity::new(&config.service_name, &config.service_version);

        let push = PushSink::install(&config.otel_endpoint, &identity)?;
        init_tracing(&config.log_level, Some(push.tracer()))?;
        tracing::info!(endpoint = %config.otel_endpoint, "OTLP trace exporter configured");

        if let Err(e) = install_error_handler() {
            tracing::warn!(error = %e, "Could not install OpenTelemetry error handler");
        }

        let metrics = Arc::new(Metrics::new(&identity)?);
        let pull = PullSink::start(config.metrics_addr()?, metrics.clone()).await?;

        tracing::info!(
            service_name = identity.service_name(),
            service_version = identity.service_version(),
            otel_endpoint = %config.otel_endpoint,
            metrics_address = %pull.local_addr(),
            "OpenTelemetry started (traces → OTLP, metrics → Prometheus)"
        );

        Ok(Self {
            identity,
            metrics,
            push,
            pull,
        })
    }

    /// Assemble from parts without touching process-global state.
    pub fn from_parts(
        identity: ResourceIdentity,
        metrics: Arc<Metrics>,
        push: PushSink,
        pull: PullSink,
    ) -> Self {
        Self {
            identity,
            metrics,
            push,
            pull,
        }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn tracer(&self) -> Tracer {
        self.push.tracer()
    }

    pub fn metrics_addr(&self) -> std::net::SocketAddr {
        self.pull.local_addr()
    }

    /// Stop the scrape listener, then flush spans within `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> FlushOutcome {
        self.pull.shutdown().await;
        self.push.shutdown(timeout).await
    }
}
