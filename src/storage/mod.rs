//! Measurement storage
//!
//! This module provides read access to raw station telemetry:
//!
//! - **types**: Core data structures (Sample, ParameterCode, TimeRange)
//! - **registry**: Validated parameter definition table
//! - **store**: `MeasurementStore` trait and the in-memory store
//! - **sqlite**: SQLite-backed store
//! - **adapter**: Timeout, retry and sentinel filtering around a store
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Read Path:
//!   fetch(station, parameter, date)
//!     → MeasurementAdapter (timeout + retry)
//!     → MeasurementStore (SQLite / memory)
//!     → filter missing → sort → Vec<Sample>
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use meteo_region::index::Station;
//! use meteo_region::storage::{AdapterConfig, MeasurementAdapter, ParameterCode, SqliteMeasurementStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteMeasurementStore::open("./data/measurements.db".as_ref())?);
//!     let adapter = MeasurementAdapter::new(store, AdapterConfig::default());
//!
//!     let station = Station::new("12375", "Warszawa-Okęcie", 52.16, 20.96);
//!     let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
//!     let samples = adapter.fetch(&station, ParameterCode::AirTemperature, date).await?;
//!
//!     println!("{} readings", samples.len());
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod error;
pub mod registry;
pub mod sqlite;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use adapter::{AdapterConfig, MeasurementAdapter};
pub use error::{StoreError, StoreResult};
pub use registry::ParameterRegistry;
pub use sqlite::SqliteMeasurementStore;
pub use store::{MeasurementStore, MemoryStore};
pub use types::{
    AggregationKind, ParameterCode, ParameterDefinition, Sample, TimeRange, UnknownParameter,
    MISSING_VALUE,
};
