//! Prometheus metrics registry.
//!
//! Key metrics:
//! - api_requests_total: Counter by method, route, status_code
//! - api_request_duration_seconds: Histogram by method, route
//! - db_items_total: Gauge of rows last seen by a list call
//!
//! Every series carries the resource identity as constant labels.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::time::Duration;

use super::resource::ResourceIdentity;

/// Latency buckets in seconds, 5ms to 2.5s.
pub const LATENCY_BUCKETS: [f64; 9] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Process-wide metric series.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    items_total: IntGauge,
}

impl Metrics {
    /// Declare and register all series.
    pub fn new(identity: &ResourceIdentity) -> Result<Self, prometheus::Error> {
        let labels: HashMap<String, String> = identity.metric_labels().into_iter().collect();
        let registry = Registry::new_custom(None, Some(labels))?;

        let requests_total = IntCounterVec::new(
            Opts::new("api_requests_total", "Total number of API requests"),
            &["method", "route", "status_code"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "api_request_duration_seconds",
                "API request duration in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "route"],
        )?;
        let items_total = IntGauge::new(
            "db_items_total",
            "Total number of items currently in the database",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(items_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            items_total,
        })
    }

    /// Record one completed request.
    pub fn record_request(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[method, route])
            .observe(elapsed.as_secs_f64());
    }

    /// Set the row-count gauge.
    pub fn set_item_count(&self, count: usize) {
        self.items_total.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Current value of the request counter for one label set.
    pub fn request_count(&self, method: &str, route: &str, status: u16) -> u64 {
        self.requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .get()
    }

    /// Number of latency observations for one label set.
    pub fn latency_samples(&self, method: &str, route: &str) -> u64 {
        self.request_duration
            .with_label_values(&[method, route])
            .get_sample_count()
    }

    pub fn item_count(&self) -> i64 {
        self.items_total.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format. In-memory only.
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Metrics {
        Metrics::new(&ResourceIdentity::new("backend-api", "test")).unwrap()
    }

    #[test]
    fn test_record_request_updates_counter_and_histogram() {
        let m = metrics();
        m.record_request("GET", "/api/items", 200, Duration::from_millis(12));
        m.record_request("GET", "/api/items", 200, Duration::from_millis(40));
        m.record_request("GET", "/api/items", 500, Duration::from_millis(3));

        assert_eq!(m.request_count("GET", "/api/items", 200), 2);
        assert_eq!(m.request_count("GET", "/api/items", 500), 1);
        assert_eq!(m.latency_samples("GET", "/api/items"), 3);
    }

    #[test]
    fn test_gauge_is_last_write_wins() {
        let m = metrics();
        m.set_item_count(7);
        m.set_item_count(3);
        assert_eq!(m.item_count(), 3);
    }

    #[test]
    fn test_render_exposes_all_series_with_identity() {
        let m = metrics();
        m.record_request("POST", "/api/items", 201, Duration::from_millis(8));
        m.set_item_count(1);

        let text = String::from_utf8(m.render().unwrap()).unwrap();
        assert!(text.contains("# TYPE api_requests_total counter"));
        assert!(text.contains("# TYPE api_request_duration_seconds histogram"));
        assert!(text.contains("# TYPE db_items_total gauge"));
        assert!(text.contains(r#"le="2.5""#));
        assert!(text.contains(r#"service_name="backend-api""#));
        assert!(text.contains(r#"status_code="201""#));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = metrics();
        let b = metrics();
        a.record_request("GET", "/health", 200, Duration::ZERO);
        assert_eq!(b.request_count("GET", "/health", 200), 0);
    }
}
