//! Test utilities and app harness for backend-api tests.
//!
//! Provides:
//! - In-process router over a temporary SQLite database
//! - In-memory span exporter for asserting on operation spans
//! - A store wrapper that fails on demand
//! - Request helpers

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use backend_api::http::FixedWindowLimiter;
use backend_api::observability::tracing::init_test_tracing;
use backend_api::observability::{Metrics, ResourceIdentity};
use backend_api::server::{build_router, AppContext};
use backend_api::storage::{DbTarget, Item, ItemStore, NewItem, SqliteItemStore, StoreError};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// SQLite store that can be told to fail its next create.
pub struct FlakyStore {
    inner: SqliteItemStore,
    fail_next_create: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: SqliteItemStore) -> Self {
        Self {
            inner,
            fail_next_create: AtomicBool::new(false),
        }
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ItemStore for FlakyStore {
    async fn list(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, item: NewItem) -> Result<Item, StoreError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(
                "connection terminated unexpectedly".into(),
            ));
        }
        self.inner.create(item).await
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        self.inner.delete(id).await
    }

    fn target(&self) -> DbTarget {
        self.inner.target()
    }
}

/// In-process application with inspectable telemetry.
pub struct TestApp {
    pub router: Router,
    pub metrics: Arc<Metrics>,
    pub store: Arc<FlakyStore>,
    pub exporter: InMemorySpanExporter,
    provider: TracerProvider,
    _temp_dir: TempDir,
}

impl TestApp {
    /// App with the production rate limit (100 per 15 minutes).
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_secs(15 * 60), 100)
    }

    pub fn with_rate_limit(window: Duration, max_requests: u32) -> Self {
        init_test_tracing();

        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let sqlite = SqliteItemStore::open(temp_dir.path().join("items.db"), 4)
            .expect("failed to open sqlite store");
        let store = Arc::new(FlakyStore::new(sqlite));

        let identity = ResourceIdentity::new("backend-api", "test");
        let metrics = Arc::new(Metrics::new(&identity).expect("failed to build metrics"));

        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("backend-api");

        let ctx = AppContext::new(
            store.clone(),
            metrics.clone(),
            tracer,
            identity,
            Arc::new(FixedWindowLimiter::new(window, max_requests)),
        );

        Self {
            router: build_router(ctx),
            metrics,
            store,
            exporter,
            provider,
            _temp_dir: temp_dir,
        }
    }

    /// Send one request from `client`.
    pub async fn request_from(
        &self,
        client: SocketAddr,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let mut request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");
        request.extensions_mut().insert(ConnectInfo(client));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).expect("body is not utf-8"),
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        self.request_from(default_client(), method, uri, body).await
    }

    /// Finished spans whose name starts with `db.`.
    pub fn db_spans(&self) -> Vec<SpanData> {
        self.exporter
            .get_finished_spans()
            .expect("exporter lock poisoned")
            .into_iter()
            .filter(|span| span.name.starts_with("db."))
            .collect()
    }

    pub fn provider(&self) -> &TracerProvider {
        &self.provider
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("body is not JSON")
    }
}

pub fn default_client() -> SocketAddr {
    "10.0.0.1:40000".parse().unwrap()
}

/// Attribute value of `key` on `span`, if set.
pub fn attr(span: &SpanData, key: &str) -> Option<opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}
