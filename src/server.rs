//! HTTP server setup and lifecycle.
//!
//! Configures the axum router with:
//! - Health, metrics and items routes
//! - Per-request metrics, request spans and panic recovery
//! - Fixed-window rate limiting in front of `/api`
//! - Graceful shutdown support

use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{delete, get},
    Router,
};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::Tracer;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, DbDriver};
use crate::http::handlers;
use crate::http::middleware::{make_request_span, record_request_metrics};
use crate::http::rate_limit::{rate_limit_middleware, FixedWindowLimiter};
use crate::observability::resource::{db_attributes, http_attributes};
use crate::observability::span::{current_context, in_span, DbOperation};
use crate::observability::{Metrics, ResourceIdentity, Telemetry};
use crate::storage::{DbTarget, ItemStore, PgItemStore, SqliteItemStore, StoreError};

/// Process-wide collaborators shared by every handler and middleware.
///
/// Built once at startup; cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ItemStore>,
    pub metrics: Arc<Metrics>,
    pub tracer: Tracer,
    pub identity: ResourceIdentity,
    pub db_target: DbTarget,
    pub limiter: Arc<FixedWindowLimiter>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn ItemStore>,
        metrics: Arc<Metrics>,
        tracer: Tracer,
        identity: ResourceIdentity,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Self {
        let db_target = store.target();
        Self {
            store,
            metrics,
            tracer,
            identity,
            db_target,
            limiter,
        }
    }

    /// Context wired to a bootstrapped telemetry stack.
    pub fn from_telemetry(telemetry: &Telemetry, store: Arc<dyn ItemStore>, config: &Config) -> Self {
        Self::new(
            store,
            telemetry.metrics(),
            telemetry.tracer(),
            telemetry.identity().clone(),
            Arc::new(FixedWindowLimiter::new(
                config.rate_limit_window(),
                config.rate_limit_max,
            )),
        )
    }

    /// Pre-execution attributes shared by every operation span.
    pub fn operation_attributes(&self, op: &DbOperation, method: &Method, route: &str) -> Vec<KeyValue> {
        let mut attributes = Vec::from(http_attributes(method.as_str(), route));
        attributes.extend(db_attributes(&self.db_target, op.operation, op.table));
        attributes
    }

    /// Run a store call inside an operation span on its own task.
    ///
    /// The task is detached from the request, so a client disconnect does not
    /// cut the database call or its span short.
    pub async fn run_operation<R, Fut, A>(
        &self,
        op: DbOperation,
        attributes: Vec<KeyValue>,
        body: Fut,
        on_success: A,
    ) -> Result<R, StoreError>
    where
        R: Send + 'static,
        Fut: Future<Output = Result<R, StoreError>> + Send + 'static,
        A: FnOnce(&R) -> Vec<KeyValue> + Send + 'static,
    {
        let tracer = self.tracer.clone();
        let parent = current_context();

        let task = tokio::spawn(async move {
            in_span(&tracer, op, attributes, parent, body, on_success).await
        });

        task.await.map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Open the store selected by the configuration.
///
/// PostgreSQL schema setup failures are logged and tolerated: the pool
/// connects lazily and requests report 500 until the database is reachable.
pub async fn open_store(config: &Config) -> Result<Arc<dyn ItemStore>, StoreError> {
    match config.db_driver {
        DbDriver::Sqlite => {
            let store = SqliteItemStore::open(&config.db_path, config.db_pool_size)?;
            Ok(Arc::new(store))
        }
        DbDriver::Postgres => {
            let store = PgItemStore::new(config.into())?;
            if let Err(e) = store.migrate().await {
                tracing::warn!(error = %e, "Could not prepare items table, continuing");
            }
            Ok(Arc::new(store))
        }
    }
}

/// Metrics, request spans and panic recovery, innermost first.
///
/// A panicking handler becomes a 500 below the metrics layer, so it is still
/// counted and timed.
pub fn instrument<S>(router: Router<S>, metrics: Arc<Metrics>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::new())
        .layer(from_fn_with_state(metrics, record_request_metrics))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
}

/// Build the application router.
pub fn build_router(ctx: AppContext) -> Router {
    let api = Router::new()
        .route(
            "/api/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/api/items/:id", delete(handlers::delete_item));
    let api = instrument(api, ctx.metrics.clone())
        .layer(from_fn_with_state(ctx.limiter.clone(), rate_limit_middleware));

    let base = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found);
    let base = instrument(base, ctx.metrics.clone());

    base.merge(api)
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Serve `router` on `listener` until the shutdown signal fires.
pub async fn run_server(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Backend API listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
        tracing::info!("Shutdown signal received, stopping server");
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::span::LIST_ITEMS;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_context(store: Arc<dyn ItemStore>) -> (AppContext, TracerProvider) {
        let identity = ResourceIdentity::new("backend-api", "test");
        let metrics = Arc::new(Metrics::new(&identity).unwrap());
        let provider = TracerProvider::builder()
            .with_simple_exporter(InMemorySpanExporter::default())
            .build();
        let ctx = AppContext::new(
            store,
            metrics,
            provider.tracer("backend-api"),
            identity,
            Arc::new(FixedWindowLimiter::new(Duration::from_secs(60), 10)),
        );
        (ctx, provider)
    }

    #[tokio::test]
    async fn test_open_store_selects_sqlite() {
        let dir = TempDir::new().unwrap();
        let config = Config::test_config(dir.path().join("items.db"));

        let store = open_store(&config).await.unwrap();
        let target = store.target();
        assert_eq!(target.system, "sqlite");
        assert!(target.host.is_none());
        assert!(target.port.is_none());
    }

    #[tokio::test]
    async fn test_operation_attributes_combine_http_and_db() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&Config::test_config(dir.path().join("items.db")))
            .await
            .unwrap();
        let (ctx, _provider) = test_context(store);

        let attrs = ctx.operation_attributes(&LIST_ITEMS, &Method::GET, "/api/items");
        let keys: Vec<&str> = attrs.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "http.method",
                "http.route",
                "db.system",
                "db.name",
                "db.operation",
                "db.sql.table"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_server_stops_on_signal() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&Config::test_config(dir.path().join("items.db")))
            .await
            .unwrap();
        let (ctx, _provider) = test_context(store);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(run_server(listener, build_router(ctx), shutdown_rx));

        shutdown_tx.send(true).unwrap();
        let served = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(served.is_ok());
    }
}
