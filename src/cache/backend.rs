//! Persistent cache backends
//!
//! A backend keeps results across restarts. It is strictly optional: the
//! in-memory cache treats every backend error as a miss (reads) or a no-op
//! (writes) and only logs it.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::query::AggregationResult;

/// Errors reported by a cache backend
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache database error: {0}")]
    Database(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// A stored result and when it was computed
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecord {
    pub result: AggregationResult,
    pub stored_at: DateTime<Utc>,
}

impl CachedRecord {
    pub fn new(result: AggregationResult) -> Self {
        Self {
            result,
            stored_at: Utc::now(),
        }
    }

    /// Time since the record was stored, zero if the clock went backwards
    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at).to_std().unwrap_or_default()
    }
}

/// Storage for cached results, addressed by the rendered cache key
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Fresh record for `key`, if any
    async fn get(&self, key: &str) -> Result<Option<CachedRecord>, CacheError>;

    async fn put(&self, key: &str, record: &CachedRecord) -> Result<(), CacheError>;

    /// Remove every cached result, returning how many were removed
    async fn clear(&self) -> Result<u64, CacheError>;
}

/// SQLite table of JSON-encoded results
pub struct SqliteCacheBackend {
    conn: Arc<Mutex<Connection>>,
    ttl: Option<Duration>,
    path: Option<PathBuf>,
}

impl SqliteCacheBackend {
    /// Create or open a cache database
    pub fn open(path: &Path, ttl: Option<Duration>) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| CacheError::Unavailable(format!("cannot open {:?}: {}", path, e)))?;

        Self::init(conn, ttl, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn in_memory(ttl: Option<Duration>) -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?, ttl, None)
    }

    fn init(conn: Connection, ttl: Option<Duration>, path: Option<PathBuf>) -> Result<Self, CacheError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS cached_results (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                stored_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl,
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| CacheError::Unavailable(format!("lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| CacheError::Unavailable(format!("cache task failed: {}", e)))?
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedRecord>, CacheError> {
        let key = key.to_string();
        let ttl = self.ttl;

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT payload, stored_at FROM cached_results WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;

            let Some((payload, stored_at)) = row else {
                return Ok(None);
            };

            let stored_at = Utc
                .timestamp_millis_opt(stored_at)
                .single()
                .ok_or_else(|| CacheError::Serialization(format!("bad timestamp {}", stored_at)))?;

            if let Some(ttl) = ttl {
                let age = (Utc::now() - stored_at).to_std().unwrap_or_default();
                if age >= ttl {
                    conn.execute("DELETE FROM cached_results WHERE key = ?1", params![key])?;
                    return Ok(None);
                }
            }

            let result: AggregationResult = serde_json::from_str(&payload)?;
            Ok(Some(CachedRecord { result, stored_at }))
        })
        .await
    }

    async fn put(&self, key: &str, record: &CachedRecord) -> Result<(), CacheError> {
        let key = key.to_string();
        let payload = serde_json::to_string(&record.result)?;
        let stored_at = record.stored_at.timestamp_millis();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cached_results (key, payload, stored_at) VALUES (?1, ?2, ?3)",
                params![key, payload, stored_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM cached_results", [])?;
            Ok(removed as u64)
        })
        .await
    }
}
