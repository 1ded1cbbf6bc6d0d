//! HTTP surface of the service.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → rate_limit.rs (/api only; 429 before any instrumentation)
//!     → request span (TraceLayer) + middleware.rs (count/latency on completion)
//!     → handlers.rs (operation span around the store call)
//!     → JSON response
//! ```

pub mod handlers;
pub mod middleware;
pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RATE_LIMIT_MESSAGE};
