use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::Mutex;

/// Cache key under which the transition graph is persisted.
pub const TRANSITIONS_CACHE_KEY: &str = "sw_transitions_v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Durable string-valued cache. Values are opaque here; callers own their format.
#[async_trait]
pub trait GraphCache: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<CachedEntry>>;
    async fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Stand-in used when no durable storage could be opened.
pub struct UnavailableGraphCache;

#[async_trait]
impl GraphCache for UnavailableGraphCache {
    async fn read(&self, key: &str) -> Result<Option<CachedEntry>> {
        Err(anyhow!("durable cache unavailable; cannot read '{key}'"))
    }

    async fn write(&self, key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("durable cache unavailable; cannot write '{key}'"))
    }
}

#[derive(Default)]
pub struct MemoryGraphCache {
    entries: Mutex<HashMap<String, CachedEntry>>,
}

impl MemoryGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with one raw value, e.g. to simulate a corrupt entry.
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            key.to_string(),
            CachedEntry {
                value: value.into(),
                updated_at: Utc::now(),
            },
        );
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl GraphCache for MemoryGraphCache {
    async fn read(&self, key: &str) -> Result<Option<CachedEntry>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().await.insert(
            key.to_string(),
            CachedEntry {
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

/// SQLite-backed key/value cache.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid cache database url '{database_url}'"))?
            .create_if_missing(true);
        // every connection to sqlite::memory: opens its own empty database
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open cache database '{database_url}'"))?;

        let storage = Self { pool };
        storage.ensure_cache_table().await?;
        Ok(storage)
    }

    async fn ensure_cache_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS client_cache (
                cache_key  TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure client_cache table exists")?;
        Ok(())
    }
}

#[async_trait]
impl GraphCache for Storage {
    async fn read(&self, key: &str) -> Result<Option<CachedEntry>> {
        let row = sqlx::query("SELECT value, updated_at FROM client_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read cache entry '{key}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.try_get("value")?;
        let raw_updated_at: String = row.try_get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&raw_updated_at)
            .map(|ts| ts.with_timezone(&Utc))
            .with_context(|| format!("cache entry '{key}' has invalid timestamp"))?;

        Ok(Some(CachedEntry { value, updated_at }))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO client_cache (cache_key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write cache entry '{key}'"))?;
        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
