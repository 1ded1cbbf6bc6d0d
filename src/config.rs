//! Configuration parsing for the items API.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Local development defaults for every setting

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error type for semantic configuration checks.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("rate limit must allow at least one request per window")]
    ZeroRateLimit,

    #[error("service port and metrics port must differ (both {0})")]
    PortClash(u16),

    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
}

/// Database driver backing the item store.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDriver {
    /// PostgreSQL through a deadpool connection pool.
    Postgres,
    /// Embedded SQLite file, for local development and tests.
    Sqlite,
}

/// Items CRUD API with OpenTelemetry tracing and Prometheus metrics.
#[derive(Parser, Debug, Clone)]
#[command(name = "backend-api")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the dedicated Prometheus scrape listener
    #[arg(long, env = "METRICS_PORT", default_value_t = 9464)]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// OpenTelemetry collector endpoint for span export (OTLP/gRPC)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = "http://localhost:4317")]
    pub otel_endpoint: String,

    /// Service name attached to all telemetry
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "backend-api")]
    pub service_name: String,

    /// Service version attached to all telemetry
    #[arg(long, env = "OTEL_SERVICE_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub service_version: String,

    /// Upper bound on the span flush at shutdown
    #[arg(long, env = "OTEL_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Database driver
    #[arg(long, env = "DB_DRIVER", value_enum, default_value_t = DbDriver::Postgres)]
    pub db_driver: DbDriver,

    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "cloudnative")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true)]
    pub db_password: String,

    /// Size of the database connection pool
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10)]
    pub db_pool_size: u32,

    /// SQLite database file (sqlite driver only)
    #[arg(long, env = "DB_PATH", default_value = "./data/items.db")]
    pub db_path: PathBuf,

    /// Length of the /api rate limit window
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,

    /// Requests allowed per client per window
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 100)]
    pub rate_limit_max: u32,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Semantic checks that clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        if self.rate_limit_max == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.port != 0 && self.port == self.metrics_port {
            return Err(ConfigError::PortClash(self.port));
        }
        self.listen_addr()?;
        self.metrics_addr()?;
        Ok(())
    }

    /// Address of the main HTTP listener.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Address of the dedicated metrics listener.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.metrics_port).parse()?)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Create a configuration for tests: sqlite at `db_path`, random ports.
    pub fn test_config(db_path: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            metrics_port: 0,
            log_level: "debug".into(),
            db_driver: DbDriver::Sqlite,
            db_path,
            db_pool_size: 4,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            metrics_port: 9464,
            log_level: "info".into(),
            otel_endpoint: "http://localhost:4317".into(),
            service_name: "backend-api".into(),
            service_version: env!("CARGO_PKG_VERSION").into(),
            shutdown_timeout_secs: 5,
            db_driver: DbDriver::Postgres,
            db_host: "localhost".into(),
            db_port: 5432,
            db_name: "cloudnative".into(),
            db_user: "postgres".into(),
            db_password: "postgres".into(),
            db_pool_size: 10,
            db_path: PathBuf::from("./data/items.db"),
            rate_limit_window_secs: 15 * 60,
            rate_limit_max: 100,
        }
    }
}
