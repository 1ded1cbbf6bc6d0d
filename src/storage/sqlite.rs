//! SQLite item store.
//!
//! Uses r2d2 with r2d2_sqlite for pooled access. WAL mode lets readers run
//! alongside the writer; rusqlite calls are blocking and run on the blocking
//! thread pool.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use super::{DbTarget, Item, ItemStore, NewItem, StoreError};

/// Apply connection pragmas for concurrent access.
fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        "#,
    )
}

/// Create the items table if it does not exist.
fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT
        );
        "#,
    )
}

/// Connection customizer that applies pragmas on every checkout.
#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas(conn)
    }
}

/// Pooled SQLite store.
#[derive(Clone)]
pub struct SqliteItemStore {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqliteItemStore {
    /// Open (creating if needed) the database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or the schema cannot be applied.
    pub fn open<P: AsRef<Path>>(db_path: P, max_size: u32) -> Result<Self, StoreError> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::PoolCreation(format!("{}: {e}", parent.display())))?;
        }

        let manager = SqliteConnectionManager::file(&path);
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)
            .map_err(|e| StoreError::PoolCreation(e.to_string()))?;

        let conn = pool.get()?;
        initialize_schema(&conn)?;
        drop(conn);
        tracing::debug!(path = %path.display(), max_size, "SQLite item store ready");

        Ok(Self { pool, path })
    }

    /// Run a blocking closure against a pooled connection.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn list(&self) -> Result<Vec<Item>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, description FROM items ORDER BY id DESC")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Item {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn create(&self, item: NewItem) -> Result<Item, StoreError> {
        self.with_conn(move |conn| {
            let row = conn.query_row(
                "INSERT INTO items (name, description) VALUES (?1, ?2) \
                 RETURNING id, name, description",
                params![item.name, item.description],
                |row| {
                    Ok(Item {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )?;
            Ok(row)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
            Ok(removed as u64)
        })
        .await
    }

    fn target(&self) -> DbTarget {
        DbTarget {
            system: "sqlite",
            name: self.path.display().to_string(),
            host: None,
            port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> SqliteItemStore {
        SqliteItemStore::open(dir.path().join("items.db"), 2).unwrap()
    }

    fn new_item(name: &str) -> NewItem {
        NewItem {
            name: Some(name.to_string()),
            description: Some(format!("{name} description")),
        }
    }

    #[tokio::test]
    async fn test_create_then_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let first = store.create(new_item("first")).await.unwrap();
        let second = store.create(new_item("second")).await.unwrap();
        assert!(second.id > first.id);

        let items = store.list().await.unwrap();
        assert_eq!(items, vec![second, first]);
    }

    #[tokio::test]
    async fn test_missing_name_violates_constraint() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let err = store.create(NewItem::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "got {err:?}");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_id_removes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let item = store.create(new_item("doomed")).await.unwrap();
        assert_eq!(store.delete(999).await.unwrap(), 0);
        assert_eq!(store.delete(item.id).await.unwrap(), 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_target_describes_embedded_database() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let target = store.target();
        assert_eq!(target.system, "sqlite");
        assert!(target.name.ends_with("items.db"));
        assert_eq!(target.host, None);
        assert_eq!(target.port, None);
    }
}
