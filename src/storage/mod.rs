//! Item persistence.
//!
//! Provides:
//! - The `ItemStore` seam that handlers call through
//! - SQLite backend (r2d2 pool) for local development and tests
//! - PostgreSQL backend (deadpool) for deployments
//!
//! Stores know nothing about telemetry; every call is wrapped by
//! [`crate::observability::span`] at the handler.

pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use postgres::PgItemStore;
pub use sqlite::SqliteItemStore;

/// Name of the single managed table.
pub const ITEMS_TABLE: &str = "items";

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create connection pool: {0}")]
    PoolCreation(String),

    #[error("Failed to check out connection: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("invalid input syntax for item id: \"{0}\"")]
    InvalidId(String),

    #[error("store task failed: {0}")]
    Task(String),
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Pool(e.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(msg.unwrap_or_else(|| err.to_string()))
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) if db.code().code().starts_with("23") => {
                StoreError::Constraint(db.message().to_string())
            }
            Some(db) => StoreError::Database(db.message().to_string()),
            None => StoreError::Database(e.to_string()),
        }
    }
}

/// A row of the items table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Fields accepted on create.
///
/// Both fields are optional at this layer: a missing name is handed to the
/// database, whose NOT NULL constraint decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewItem {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Where a store points, described for span attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTarget {
    /// Semantic-convention `db.system` value.
    pub system: &'static str,
    /// Database (or file) name.
    pub name: String,
    /// Peer host, absent for embedded databases.
    pub host: Option<String>,
    /// Peer port, absent for embedded databases.
    pub port: Option<u16>,
}

/// The three operations the HTTP layer needs against the items table.
#[async_trait]
pub trait ItemStore: Send + Sync + 'static {
    /// All items, newest (highest id) first.
    async fn list(&self) -> Result<Vec<Item>, StoreError>;

    /// Insert one item and return the stored row.
    async fn create(&self, item: NewItem) -> Result<Item, StoreError>;

    /// Delete by id. Returns the number of rows removed; removing nothing is not an error.
    async fn delete(&self, id: i64) -> Result<u64, StoreError>;

    /// Connection description for telemetry.
    fn target(&self) -> DbTarget;
}

/// Parse a path id the way the database would: anything not an integer is rejected.
pub fn parse_item_id(raw: &str) -> Result<i64, StoreError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidId(raw.to_string()))
}
