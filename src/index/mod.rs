//! Geospatial Index
//!
//! Resolves which weather stations fall inside an administrative unit:
//!
//! - **polygon**: Rings and containment on `geo` geometry
//! - **types**: Station and AdministrativeUnit records
//! - **geo_index**: Immutable index with the station-to-unit spatial join
//! - **store**: SQLite document store the index is loaded from
//!
//! # Architecture
//!
//! ```text
//! Startup:
//!   SqliteGeoStore → units + stations → GeoIndex::new (spatial join)
//!
//! Request: "stations in powiat krakowski"
//!        ↓
//! resolve(id | name) → AdministrativeUnit
//!        ↓
//! stations_in(unit) → join result, sorted by station id
//! ```

mod error;
mod geo_index;
mod polygon;
mod store;
mod types;

pub use error::{IndexError, IndexResult};
pub use geo_index::{GeoIndex, GeoStats, StationUnits};
pub use polygon::{Boundary, GeoPoint, Ring, Shape};
pub use store::SqliteGeoStore;
pub use types::{AdministrativeUnit, Station, UnitLevel};
