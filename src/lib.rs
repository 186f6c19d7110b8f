//! # meteo-region
//!
//! Day/night weather statistics for Polish provinces (województwa) and
//! counties (powiaty), computed from IMGW station telemetry.
//!
//! ## Features
//!
//! - **Geospatial index**: stations joined to administrative boundaries on `geo` polygons
//! - **Solar partitioning**: readings split at each station's own sunrise and sunset
//! - **Aggregation**: mean, median and trimmed mean, or sum, or max per parameter
//! - **Single-flight cache**: one computation per (region, date, parameters)
//!
//! ## Modules
//!
//! - [`index`]: Stations, administrative units and the spatial join
//! - [`solar`]: Sunrise/sunset and the day/night partitioner
//! - [`storage`]: Measurement stores and the retrying adapter
//! - [`query`]: Aggregation and the statistics service
//! - [`cache`]: Result cache with optional persistent backend
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meteo_region::index::{AdministrativeUnit, Boundary, GeoIndex, Ring, Station, UnitLevel};
//! use meteo_region::storage::{MemoryStore, ParameterCode, Sample};
//! use meteo_region::StatisticsService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let boundary = Boundary::from_ring(Ring::from_coords(&[
//!         (19.79, 49.97), (20.22, 49.97), (20.22, 50.13), (19.79, 50.13),
//!     ]));
//!     let units = vec![AdministrativeUnit::new("1261", "Kraków", UnitLevel::County, boundary)];
//!     let stations = vec![Station::new("12566", "Kraków-Obserwatorium", 50.06, 19.96)];
//!     let index = Arc::new(GeoIndex::new(units, stations)?);
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let noon = chrono::Utc::now();
//!     store.insert(Sample::at("12566", ParameterCode::AirTemperature, noon, 21.5)).await;
//!
//!     let service = StatisticsService::new(index, store);
//!     let result = service.compute_statistics("Kraków", noon.date_naive()).await?;
//!
//!     println!("{}", serde_json::to_string_pretty(result.as_ref())?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod index;
pub mod query;
pub mod solar;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    AggregationKind, MeasurementAdapter, MeasurementStore, ParameterCode, ParameterDefinition,
    ParameterRegistry, Sample, StoreError, StoreResult,
};

pub use index::{AdministrativeUnit, GeoIndex, IndexError, Station, UnitLevel};

pub use solar::{DayNightPartitioner, Period, SolarCalculator};

pub use query::{
    AggregationResult, Aggregator, Comparison, ParameterStatistics, Statistic, StatisticsService,
    StatsError, StatsResult,
};

pub use cache::{CacheKey, ResultCache};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError};
