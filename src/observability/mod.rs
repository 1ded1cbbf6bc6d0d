//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Resource identity and span attribute helpers
//! - Prometheus metrics registry and scrape endpoint (pull sink)
//! - OTLP span export (push sink)
//! - Bootstrap/shutdown composing both sinks
//! - Span-per-operation wrapper for database calls
//! - Structured logging bridged into traces

pub mod metrics;
pub mod otlp;
pub mod pipeline;
pub mod prometheus;
pub mod resource;
pub mod span;
pub mod tracing;

pub use metrics::Metrics;
pub use pipeline::Telemetry;
pub use resource::ResourceIdentity;

use std::net::SocketAddr;
use thiserror::Error;

/// Error type for telemetry bootstrap.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to build trace pipeline: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] ::prometheus::Error),

    #[error("Failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install log subscriber: {0}")]
    Subscriber(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
