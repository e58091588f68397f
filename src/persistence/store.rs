//! SQLite-based cache store

use crate::error::CacheError;
use crate::persistence::{CacheStore, CacheValue};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_records (
    key        TEXT PRIMARY KEY NOT NULL,
    is_text    INTEGER NOT NULL,
    value      BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
) WITHOUT ROWID;
"#;

/// SQLite cache store
///
/// Cloning is cheap and shares the underlying pool.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`; `:memory:` gives a private in-memory database
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let in_memory = path == Path::new(":memory:");

        let mut options = SqliteConnectOptions::new().busy_timeout(Duration::from_secs(30));
        options = if in_memory {
            options.in_memory(true)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            options
                .filename(&path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        // Every connection to :memory: is its own database, so keep exactly one
        // and never let the pool retire it.
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(30))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query(SCHEMA).execute(&mut *conn).await?;
                    Ok(())
                })
            });
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;
        debug!(path = %path.display(), "sqlite cache ready");

        Ok(Self { pool, path })
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self, CacheError> {
        Self::new(Self::default_path()).await
    }

    /// Default on-disk location of the cache database
    pub fn default_path() -> PathBuf {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        data_dir.join("dagpipe").join("cache.db")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

}

#[async_trait::async_trait]
impl CacheStore for SqliteCache {
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let row = sqlx::query("SELECT is_text, value FROM cache_records WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let is_text: bool = row.get("is_text");
        let value: Vec<u8> = row.get("value");
        if is_text {
            let text = String::from_utf8(value).map_err(|e| {
                CacheError::Backend(format!("record '{key}' is not valid UTF-8 text: {e}"))
            })?;
            Ok(Some(CacheValue::Text(text)))
        } else {
            Ok(Some(CacheValue::Bytes(value)))
        }
    }

    async fn write(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        let (is_text, blob) = match value {
            CacheValue::Text(s) => (true, s.into_bytes()),
            CacheValue::Bytes(b) => (false, b),
        };

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache_records (key, is_text, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            "#,
        )
        .bind(key)
        .bind(is_text)
        .bind(blob)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_records WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
