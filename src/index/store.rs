//! Document store for administrative units and stations
//!
//! SQLite tables filled by the import jobs (shapefile and station list
//! parsers live outside this crate). The statistics pipeline only reads.
//! Boundaries are stored as JSON ring arrays: `[[[lon, lat], ...], ...]`.

use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::index::error::{IndexError, IndexResult};
use crate::index::geo_index::GeoIndex;
use crate::index::polygon::Boundary;
use crate::index::types::{AdministrativeUnit, Station, UnitLevel};

/// SQLite-backed unit and station store
pub struct SqliteGeoStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteGeoStore {
    /// Create or open a geometry database
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn in_memory() -> IndexResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> IndexResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS admin_units (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                level TEXT NOT NULL,
                parent_id TEXT,
                boundary TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_admin_units_level ON admin_units(level);

            CREATE TABLE IF NOT EXISTS stations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            );
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> IndexResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| IndexError::Database(format!("lock poisoned: {}", e)))
    }

    /// Insert or replace a unit
    pub fn upsert_unit(&self, unit: &AdministrativeUnit) -> IndexResult<()> {
        let boundary = serde_json::to_string(&unit.boundary)?;
        self.lock()?.execute(
            "INSERT OR REPLACE INTO admin_units (id, name, level, parent_id, boundary)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![unit.id, unit.name, unit.level.as_str(), unit.parent_id, boundary],
        )?;
        Ok(())
    }

    /// Insert or replace a station
    pub fn upsert_station(&self, station: &Station) -> IndexResult<()> {
        self.lock()?.execute(
            "INSERT OR REPLACE INTO stations (id, name, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4)",
            params![station.id, station.name, station.latitude, station.longitude],
        )?;
        Ok(())
    }

    /// All units, sorted by id
    pub fn load_units(&self) -> IndexResult<Vec<AdministrativeUnit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, level, parent_id, boundary FROM admin_units ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut units = Vec::new();
        for row in rows {
            let (id, name, level, parent_id, boundary) = row?;
            let level: UnitLevel = level.parse()?;
            let boundary: Boundary = serde_json::from_str(&boundary).map_err(|e| {
                IndexError::Serialization(format!("boundary of unit {}: {}", id, e))
            })?;

            units.push(AdministrativeUnit {
                id,
                name,
                level,
                parent_id,
                boundary,
            });
        }

        Ok(units)
    }

    /// All stations, sorted by id
    pub fn load_stations(&self) -> IndexResult<Vec<Station>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, name, latitude, longitude FROM stations ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok(Station {
                id: row.get(0)?,
                name: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
            })
        })?;

        let mut stations = Vec::new();
        for row in rows {
            stations.push(row?);
        }
        Ok(stations)
    }
}

impl GeoIndex {
    /// Build the index from the document store
    pub fn load(store: &SqliteGeoStore) -> IndexResult<Self> {
        let units = store.load_units()?;
        let stations = store.load_stations()?;
        tracing::info!(
            units = units.len(),
            stations = stations.len(),
            path = ?store.path(),
            "Loaded geometry"
        );
        GeoIndex::new(units, stations)
    }
}
