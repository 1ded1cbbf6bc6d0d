//! backend-api: an items CRUD service instrumented with OpenTelemetry.
//!
//! The CRUD surface is deliberately small; what matters is the contract the
//! instrumentation gives every request:
//!
//! - **Metrics**: each request is counted and timed once, labelled by method,
//!   route template and status, and exposed in Prometheus text format
//! - **Traces**: each database call runs in its own client span that always
//!   ends, with `Ok`/`Error` status and the exception recorded on failure
//! - **Export**: spans are pushed over OTLP/gRPC, metrics are pulled by a
//!   scraper; the two sinks never wait on each other
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`http`]: Handlers, metrics middleware, rate limiting
//! - [`observability`]: Telemetry bootstrap, sinks, span wrapper, logging
//! - [`server`]: Application context, router and server lifecycle
//! - [`storage`]: Item store trait with SQLite and PostgreSQL backends

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // storage::sqlite::SqliteItemStore is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::cast_possible_wrap          // row counts fit in i64
)]

pub mod config;
pub mod http;
pub mod observability;
pub mod server;
pub mod storage;

pub use config::Config;
pub use observability::Telemetry;
pub use server::{build_router, run_server, AppContext};
