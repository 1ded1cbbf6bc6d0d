//! backend-api: items CRUD service with OpenTelemetry instrumentation.
//!
//! # Usage
//!
//! ```bash
//! backend-api --port 3000 --db-driver sqlite --db-path ./data/items.db
//! ```
//!
//! Environment variables can also be used:
//! - `PORT`: Port to listen on
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector for span export
//! - `OTEL_SERVICE_NAME`: Service name on all telemetry
//! - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`: PostgreSQL
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use backend_api::config::Config;
use backend_api::observability::Telemetry;
use backend_api::server::{build_router, open_store, run_server, AppContext};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();
    config.validate().context("invalid configuration")?;

    // Telemetry must be running before anything instrumented exists
    let telemetry = Telemetry::bootstrap(&config)
        .await
        .context("failed to start OpenTelemetry")?;

    let store = open_store(&config)
        .await
        .context("failed to open item store")?;
    let ctx = AppContext::from_telemetry(&telemetry, store, &config);
    tracing::info!(
        db_system = ctx.db_target.system,
        db_name = %ctx.db_target.name,
        "Item store ready"
    );

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        // Wait for SIGTERM or SIGINT (Ctrl+C)
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("failed to listen for ctrl+c");
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        // Signal shutdown
        let _ = shutdown_tx.send(true);
    });

    // Bind only after telemetry and the store are in place
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let served = run_server(listener, build_router(ctx), shutdown_rx).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "Server error");
    }

    // Flush spans even if serving failed; the flush outcome is logged, not escalated
    telemetry.shutdown(config.shutdown_timeout()).await;

    tracing::info!("backend-api shutdown complete");
    served.map_err(Into::into)
}
