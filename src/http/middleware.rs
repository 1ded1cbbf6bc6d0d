//! Request metrics and request-span middleware.

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::Metrics;

/// Route label for a request: the matched template, else the raw path.
pub fn route_label<B>(request: &http::Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// Count and time every request once the response is produced, whatever its status.
pub async fn record_request_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = route_label(&request);

    let response = next.run(request).await;

    metrics.record_request(method.as_str(), &route, response.status().as_u16(), start.elapsed());
    response
}

/// Server span for one inbound request, exported through the OpenTelemetry layer.
pub fn make_request_span(request: &http::Request<Body>) -> tracing::Span {
    let route = route_label(request);
    tracing::info_span!(
        "http.request",
        otel.name = %format!("{} {}", request.method(), route),
        otel.kind = "server",
        http.method = %request.method(),
        http.route = %route,
        http.target = %request.uri(),
    )
}
