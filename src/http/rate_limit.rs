//! Fixed-window rate limiting for `/api` routes.
//!
//! Each client IP gets `max_requests` per window. The limiter sits outside
//! the metrics and tracing layers, so rejected requests are never recorded.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Body of every 429 response.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Entries beyond this count trigger a sweep of expired windows.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Per-client fixed-window counter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
    max_requests: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count one request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }
}

/// Middleware function for `/api` rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests()));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            let mut response = Response::new(Body::from(RATE_LIMIT_MESSAGE));
            *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_limit_then_rejects() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(900), 3);
        let now = Instant::now();

        assert_eq!(limiter.check_at("a", now), Decision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at("a", now), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("a", now), Decision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check_at("a", now), Decision::Limited { .. }));
    }

    #[test]
    fn test_clients_are_counted_separately() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(900), 1);
        let now = Instant::now();

        assert!(matches!(limiter.check_at("a", now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at("b", now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at("a", now), Decision::Limited { .. }));
    }

    #[test]
    fn test_window_resets() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        let start = Instant::now();

        assert!(matches!(limiter.check_at("a", start), Decision::Allowed { .. }));
        match limiter.check_at("a", start + Duration::from_secs(20)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(40)),
            other => panic!("expected limited, got {other:?}"),
        }
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(60)),
            Decision::Allowed { remaining: 0 }
        ));
    }
}
