//! PostgreSQL item store backed by a deadpool connection pool.

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, PoolConfig as PoolSize, Runtime};
use tokio_postgres::{NoTls, Row};

use super::{DbTarget, Item, ItemStore, NewItem, StoreError};
use crate::config::Config;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS items (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT
)";

/// Connection settings for the PostgreSQL store.
#[derive(Debug, Clone)]
pub struct PgSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
}

impl From<&Config> for PgSettings {
    fn from(config: &Config) -> Self {
        Self {
            host: config.db_host.clone(),
            port: config.db_port,
            database: config.db_name.clone(),
            user: config.db_user.clone(),
            password: config.db_password.clone(),
            max_connections: config.db_pool_size as usize,
        }
    }
}

/// Pooled PostgreSQL store.
#[derive(Clone)]
pub struct PgItemStore {
    pool: Pool,
    settings: PgSettings,
}

impl PgItemStore {
    /// Build the pool. No connection is attempted here.
    pub fn new(settings: PgSettings) -> Result<Self, StoreError> {
        let mut cfg = PoolConfig::new();
        cfg.host = Some(settings.host.clone());
        cfg.port = Some(settings.port);
        cfg.user = Some(settings.user.clone());
        cfg.password = Some(settings.password.clone());
        cfg.dbname = Some(settings.database.clone());
        cfg.pool = Some(PoolSize::new(settings.max_connections));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::PoolCreation(e.to_string()))?;

        Ok(Self { pool, settings })
    }

    /// Create the items table if it does not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.batch_execute(CREATE_TABLE).await?;
        tracing::debug!(
            host = %self.settings.host,
            database = %self.settings.database,
            "PostgreSQL schema ready"
        );
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Client, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn item_from_row(row: &Row) -> Item {
    Item {
        id: i64::from(row.get::<_, i32>("id")),
        name: row.get("name"),
        description: row.get("description"),
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn list(&self) -> Result<Vec<Item>, StoreError> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT id, name, description FROM items ORDER BY id DESC", &[])
            .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn create(&self, item: NewItem) -> Result<Item, StoreError> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO items (name, description) VALUES ($1, $2) \
                 RETURNING id, name, description",
                &[&item.name, &item.description],
            )
            .await?;
        Ok(item_from_row(&row))
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        let id = i32::try_from(id).map_err(|_| StoreError::InvalidId(id.to_string()))?;
        let client = self.client().await?;
        Ok(client
            .execute("DELETE FROM items WHERE id = $1", &[&id])
            .await?)
    }

    fn target(&self) -> DbTarget {
        DbTarget {
            system: "postgresql",
            name: self.settings.database.clone(),
            host: Some(self.settings.host.clone()),
            port: Some(self.settings.port),
        }
    }
}
