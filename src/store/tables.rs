//! Persistent content cache
//!
//! Durable, namespaced storage: one SQLite table per content kind plus a
//! `meta` table for the last-seen app version. Rows never expire on their
//! own; they are replaced by newer fetches and cleared only by an explicit
//! reset. Sync rusqlite calls are bridged onto the blocking thread pool so
//! the async engine never stalls the runtime.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::info;

use crate::error::{ContentError, Result};
use crate::key::{ContentKey, ContentKind};

const ALL_KINDS: [ContentKind; 4] = [
    ContentKind::Interface,
    ContentKind::CommonContent,
    ContentKind::LessonContent,
    ContentKind::VideoContent,
];

/// A row read back from a content table.
#[derive(Debug, Clone)]
pub struct CachedRecord {
    pub payload: Value,
    pub complete: bool,
    pub fetched_at: DateTime<Utc>,
}

/// SQLite-backed persistent cache, partitioned by content kind.
pub struct ContentTables {
    pool: Pool<SqliteConnectionManager>,
}

impl ContentTables {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| ContentError::Table(format!("pool build failed: {e}")))?;

        let tables = Self { pool };
        tables.init_schema()?;
        info!(path = path, "Content tables opened");
        Ok(tables)
    }

    /// In-memory database for tests. Single connection so every caller sees
    /// the same data.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| ContentError::Table(format!("pool build failed: {e}")))?;

        let tables = Self { pool };
        tables.init_schema()?;
        Ok(tables)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        for kind in ALL_KINDS {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        composite_key TEXT PRIMARY KEY,
                        payload TEXT NOT NULL,
                        complete INTEGER NOT NULL,
                        fetched_at TEXT NOT NULL
                    )",
                    kind.table_name()
                ),
                [],
            )
            .map_err(|e| ContentError::Table(e.to_string()))?;
        }
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ContentError::Table(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| ContentError::Table(format!("connection checkout failed: {e}")))
    }

    /// Seed rows directly, bypassing serialization. Lets tests set up
    /// corrupt or legacy data the typed API cannot produce.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn()?
            .execute(sql, [])
            .map_err(|e| ContentError::Table(e.to_string()))?;
        Ok(())
    }

    /// Run a sync database operation on the blocking pool.
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ContentError::Table(format!("connection checkout failed: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ContentError::Table(format!("task join error: {e}")))?
    }

    // =========================================================================
    // Content rows
    // =========================================================================

    /// Read the cached record for a key, if present.
    pub async fn get(&self, key: &ContentKey) -> Result<Option<CachedRecord>> {
        let table = key.kind.table_name();
        let composite = key.storage_key();

        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT payload, complete, fetched_at FROM {table} \
                         WHERE composite_key = ?1"
                    ),
                    params![composite],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| ContentError::Table(e.to_string()))?;

            let Some((payload_text, complete, fetched_at)) = row else {
                return Ok(None);
            };
            let payload: Value = serde_json::from_str(&payload_text)
                .map_err(|e| ContentError::Table(format!("corrupt cached payload: {e}")))?;
            let fetched_at = fetched_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now());

            Ok(Some(CachedRecord {
                payload,
                complete: complete != 0,
                fetched_at,
            }))
        })
        .await
    }

    /// Insert or replace the record for a key.
    pub async fn put(&self, key: &ContentKey, payload: &Value, complete: bool) -> Result<()> {
        let table = key.kind.table_name();
        let composite = key.storage_key();
        let payload_text = payload.to_string();
        let fetched_at = Utc::now().to_rfc3339();

        self.with_connection(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {table} \
                     (composite_key, payload, complete, fetched_at) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![composite, payload_text, complete as i64, fetched_at],
            )
            .map_err(|e| ContentError::Table(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Delete every row in one kind's table.
    pub async fn clear_kind(&self, kind: ContentKind) -> Result<()> {
        let table = kind.table_name();
        self.with_connection(move |conn| {
            conn.execute(&format!("DELETE FROM {table}"), [])
                .map_err(|e| ContentError::Table(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Delete all cached content, one table at a time.
    pub async fn clear_all(&self) -> Result<()> {
        for kind in ALL_KINDS {
            self.clear_kind(kind).await?;
        }
        info!("All content tables cleared");
        Ok(())
    }

    // =========================================================================
    // Meta
    // =========================================================================

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| ContentError::Table(e.to_string()))
        })
        .await
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| ContentError::Table(e.to_string()))?;
            Ok(())
        })
        .await
    }
}
