//! Prometheus HTTP endpoint for metrics scraping (the pull sink).
//!
//! The dedicated listener serves only `/metrics`.
//!
//! The same rendering backs `GET /metrics` on the main service so a single
//! scrape target suffices.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::metrics::{Metrics, TEXT_CONTENT_TYPE};
use super::TelemetryError;

/// Render `metrics` as an HTTP response.
pub fn metrics_response(metrics: &Metrics) -> Response {
    match metrics.render() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {e}"),
            )
                .into_response()
        }
    }
}

/// Create the Prometheus HTTP router.
pub fn create_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// Handle GET /metrics - Prometheus metrics endpoint.
async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    metrics_response(&metrics)
}

/// Dedicated scrape listener running in the background.
pub struct PullSink {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PullSink {
    /// Bind `addr` and serve the registry until [`PullSink::shutdown`].
    ///
    /// Binding happens before this returns, so a port conflict fails bootstrap.
    pub async fn start(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<Self, TelemetryError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TelemetryError::Bind { addr, source })?;
        let addr = listener.local_addr().map_err(|source| TelemetryError::Bind { addr, source })?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let app = create_router(metrics);
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                    tracing::info!("Prometheus server shutting down");
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Prometheus server error");
            }
        });

        tracing::info!(address = %addr, "Prometheus metrics server listening");
        Ok(Self {
            addr,
            shutdown_tx,
            handle,
        })
    }

    /// Address actually bound (useful when started on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop the listener and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Prometheus server task failed");
        }
    }
}
