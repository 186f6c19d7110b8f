//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::cache::CacheStats;
use crate::index::{AdministrativeUnit, GeoStats, Station, UnitLevel};
use crate::storage::ParameterCode;

// ============================================
// REGION DTOs
// ============================================

/// Query string of `GET /api/v1/regions`
#[derive(Debug, Default, Deserialize)]
pub struct RegionListQuery {
    /// `province` / `county` (Polish names accepted)
    #[serde(default)]
    pub level: Option<String>,
    /// Only units inside this parent (id or name)
    #[serde(default)]
    pub parent: Option<String>,
}

impl RegionListQuery {
    pub fn level(&self) -> Result<Option<UnitLevel>, ApiError> {
        self.level
            .as_deref()
            .map(|l| l.parse::<UnitLevel>().map_err(|e| ApiError::Validation(e.to_string())))
            .transpose()
    }
}

/// Administrative unit summary
#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub id: String,
    pub name: String,
    pub level: UnitLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl From<&AdministrativeUnit> for RegionResponse {
    fn from(unit: &AdministrativeUnit) -> Self {
        Self {
            id: unit.id.clone(),
            name: unit.name.clone(),
            level: unit.level,
            parent_id: unit.parent_id.clone(),
        }
    }
}

/// Region list response
#[derive(Debug, Serialize)]
pub struct RegionListResponse {
    pub total: usize,
    pub regions: Vec<RegionResponse>,
}

/// Station summary
#[derive(Debug, Serialize)]
pub struct StationResponse {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Station> for StationResponse {
    fn from(station: Station) -> Self {
        Self {
            id: station.id,
            name: station.name,
            latitude: station.latitude,
            longitude: station.longitude,
        }
    }
}

/// Single region with the stations inside it
#[derive(Debug, Serialize)]
pub struct RegionDetailResponse {
    #[serde(flatten)]
    pub region: RegionResponse,
    pub station_count: usize,
    pub stations: Vec<StationResponse>,
}

// ============================================
// STATISTICS DTOs
// ============================================

/// Query string of `GET /api/v1/regions/:id/statistics`
#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Comma-separated parameter codes; all configured parameters when absent
    #[serde(default)]
    pub parameters: Option<String>,
}

impl StatisticsQuery {
    pub fn date(&self) -> Result<NaiveDate, ApiError> {
        parse_date("date", &self.date)
    }

    pub fn parameters(&self) -> Result<Vec<ParameterCode>, ApiError> {
        let Some(list) = self.parameters.as_deref() else {
            return Ok(Vec::new());
        };

        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ParameterCode>().map_err(|e| ApiError::Validation(e.to_string())))
            .collect()
    }
}

/// Query string of `GET /api/v1/regions/:id/changes`
#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    pub from: String,
    pub to: String,
}

impl ChangesQuery {
    pub fn dates(&self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        Ok((parse_date("from", &self.from)?, parse_date("to", &self.to)?))
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::Validation(format!("{} must be a YYYY-MM-DD date, got '{}'", field, value))
    })
}

// ============================================
// CACHE DTOs
// ============================================

/// Cache clear response
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub status: String,
    /// In-memory entries dropped
    pub cleared: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "ok" or "error"
    pub store: String,
    pub index: GeoStats,
    pub cache: CacheStats,
    pub uptime_seconds: u64,
    pub version: String,
}
