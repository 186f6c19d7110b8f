//! SQLite measurement store
//!
//! One row per reading, keyed by (station, parameter, timestamp). A NULL
//! value is a reading the upstream feed reported as missing.
//!
//! # Performance
//! - Range query: O(log n + k) on the primary key
//! - Queries run on the blocking pool so the runtime threads never wait on disk

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::store::MeasurementStore;
use crate::storage::types::{ParameterCode, Sample, TimeRange, MISSING_VALUE};

/// SQLite-backed measurement store
pub struct SqliteMeasurementStore {
    /// `None` once the store has been closed
    conn: Arc<Mutex<Option<Connection>>>,
    path: Option<PathBuf>,
}

impl SqliteMeasurementStore {
    /// Create or open a measurement database
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable(format!("cannot open {:?}: {}", path, e)))?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                station_id TEXT NOT NULL,
                parameter TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                value REAL,
                PRIMARY KEY (station_id, parameter, timestamp)
            ) WITHOUT ROWID",
            [],
        )?;

        tracing::debug!(path = ?path, "Measurement store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
        })
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace readings (used by import jobs and tests)
    ///
    /// Missing readings are stored as NULL.
    pub fn append_batch(&self, samples: &[Sample]) -> StoreResult<usize> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut guard = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("store is closed".to_string()))?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO samples (station_id, parameter, timestamp, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for sample in samples {
                let value = if sample.is_missing() {
                    None
                } else {
                    Some(sample.value)
                };
                stmt.execute(params![
                    sample.station_id,
                    sample.parameter.code(),
                    sample.timestamp,
                    value
                ])?;
            }
        }
        tx.commit()?;

        Ok(samples.len())
    }

    /// Total number of stored rows
    pub fn count(&self) -> StoreResult<u64> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("store is closed".to_string()))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn query_blocking(
    conn: &Mutex<Option<Connection>>,
    station_id: &str,
    parameter: ParameterCode,
    range: TimeRange,
) -> StoreResult<Vec<Sample>> {
    let guard = conn
        .lock()
        .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
    let conn = guard
        .as_ref()
        .ok_or_else(|| StoreError::Unavailable("store is closed".to_string()))?;

    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, value FROM samples
         WHERE station_id = ?1 AND parameter = ?2 AND timestamp >= ?3 AND timestamp < ?4
         ORDER BY timestamp",
    )?;

    let rows = stmt.query_map(
        params![station_id, parameter.code(), range.start, range.end],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?)),
    )?;

    let mut samples = Vec::new();
    for row in rows {
        let (timestamp, value) = row?;
        samples.push(Sample::new(
            station_id,
            parameter,
            timestamp,
            value.unwrap_or(MISSING_VALUE),
        ));
    }

    Ok(samples)
}

#[async_trait]
impl MeasurementStore for SqliteMeasurementStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(
        &self,
        station_id: &str,
        parameter: ParameterCode,
        range: TimeRange,
    ) -> StoreResult<Vec<Sample>> {
        let conn = Arc::clone(&self.conn);
        let station_id = station_id.to_string();

        tokio::task::spawn_blocking(move || query_blocking(&conn, &station_id, parameter, range))
            .await
            .map_err(|e| StoreError::Database(format!("query task failed: {}", e)))?
    }

    async fn ping(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| StoreError::Unavailable("store is closed".to_string()))?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("ping task failed: {}", e)))?
    }

    async fn close(&self) -> StoreResult<()> {
        let taken = {
            let mut guard = self
                .conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
            guard.take()
        };

        if let Some(conn) = taken {
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
            tracing::info!(path = ?self.path, "Measurement store closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn temp(station: &str, ts: i64, value: f64) -> Sample {
        Sample::new(station, ParameterCode::AirTemperature, ts, value)
    }

    #[tokio::test]
    async fn test_append_and_query() {
        let dir = tempdir().unwrap();
        let store = SqliteMeasurementStore::open(&dir.path().join("measurements.db")).unwrap();

        store
            .append_batch(&[
                temp("12375", 3_000, 3.0),
                temp("12375", 1_000, 1.0),
                temp("12375", 2_000, 2.0),
                temp("12566", 2_000, 9.0),
            ])
            .unwrap();

        let range = TimeRange::try_new(1_000, 3_000).unwrap();
        let samples = store
            .query("12375", ParameterCode::AirTemperature, range)
            .await
            .unwrap();

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(store.count().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_missing_roundtrips_as_sentinel() {
        let store = SqliteMeasurementStore::in_memory().unwrap();
        store
            .append_batch(&[temp("12375", 1_000, f64::NAN), temp("12375", 2_000, 4.0)])
            .unwrap();

        let range = TimeRange::try_new(0, 10_000).unwrap();
        let samples = store
            .query("12375", ParameterCode::AirTemperature, range)
            .await
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert!(samples[0].is_missing());
        assert_eq!(samples[0].value, MISSING_VALUE);
        assert!(!samples[1].is_missing());
    }

    #[tokio::test]
    async fn test_reopen_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("measurements.db");

        {
            let store = SqliteMeasurementStore::open(&path).unwrap();
            store.append_batch(&[temp("12375", 1_000, 1.5)]).unwrap();
            store.close().await.unwrap();
        }

        let store = SqliteMeasurementStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let store = SqliteMeasurementStore::in_memory().unwrap();
        store.ping().await.unwrap();
        store.close().await.unwrap();

        let range = TimeRange::try_new(0, 10).unwrap();
        let err = store
            .query("12375", ParameterCode::AirTemperature, range)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.ping().await.is_err());
    }
}
