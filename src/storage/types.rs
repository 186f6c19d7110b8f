//! Core data types for station telemetry
//!
//! This module defines the fundamental types used throughout the store layer:
//! - `Sample`: A single telemetry reading of one station and one parameter
//! - `ParameterCode`: The closed set of IMGW telemetry parameters
//! - `ParameterDefinition`: Unit and aggregation rule for a parameter
//! - `TimeRange`: A time interval for queries

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sentinel written by upstream feeds for a missing reading
pub const MISSING_VALUE: f64 = -9999.0;

/// A single telemetry reading
///
/// Timestamps are UTC at minute resolution, stored as Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    /// Station identifier (IMGW station code)
    pub station_id: String,
    /// Measured parameter
    pub parameter: ParameterCode,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Measured value, or [`MISSING_VALUE`]
    pub value: f64,
}

impl Sample {
    pub fn new(
        station_id: impl Into<String>,
        parameter: ParameterCode,
        timestamp: i64,
        value: f64,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            parameter,
            timestamp,
            value,
        }
    }

    /// Create a sample from a UTC instant
    pub fn at(
        station_id: impl Into<String>,
        parameter: ParameterCode,
        at: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self::new(station_id, parameter, at.timestamp_millis(), value)
    }

    /// Create a sample marked as missing
    pub fn missing(station_id: impl Into<String>, parameter: ParameterCode, timestamp: i64) -> Self {
        Self::new(station_id, parameter, timestamp, MISSING_VALUE)
    }

    /// True for the sentinel and for non-finite values
    pub fn is_missing(&self) -> bool {
        !self.value.is_finite() || self.value == MISSING_VALUE
    }
}

/// IMGW telemetry parameter codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterCode {
    /// Air temperature
    #[serde(rename = "B00300S")]
    AirTemperature,
    /// Ground temperature
    #[serde(rename = "B00305A")]
    GroundTemperature,
    /// Wind direction
    #[serde(rename = "B00202A")]
    WindDirection,
    /// Mean wind speed over 10 minutes
    #[serde(rename = "B00702A")]
    WindSpeed,
    /// Maximum wind speed
    #[serde(rename = "B00703A")]
    MaxWindSpeed,
    /// Precipitation over 10 minutes
    #[serde(rename = "B00608S")]
    Precipitation10Min,
    /// Daily precipitation total
    #[serde(rename = "B00604S")]
    DailyPrecipitation,
    /// Hourly precipitation total
    #[serde(rename = "B00606S")]
    HourlyPrecipitation,
    /// Relative humidity
    #[serde(rename = "B00802A")]
    RelativeHumidity,
    /// Maximum gust over 10 minutes
    #[serde(rename = "B00714A")]
    MaxGust,
    /// Snow water equivalent
    #[serde(rename = "B00910A")]
    SnowWaterEquivalent,
}

impl ParameterCode {
    /// Get all parameter codes for iteration
    pub fn all() -> &'static [ParameterCode] {
        &[
            ParameterCode::AirTemperature,
            ParameterCode::GroundTemperature,
            ParameterCode::WindDirection,
            ParameterCode::WindSpeed,
            ParameterCode::MaxWindSpeed,
            ParameterCode::Precipitation10Min,
            ParameterCode::DailyPrecipitation,
            ParameterCode::HourlyPrecipitation,
            ParameterCode::RelativeHumidity,
            ParameterCode::MaxGust,
            ParameterCode::SnowWaterEquivalent,
        ]
    }

    /// The IMGW code as stored in the measurement database
    pub fn code(&self) -> &'static str {
        match self {
            ParameterCode::AirTemperature => "B00300S",
            ParameterCode::GroundTemperature => "B00305A",
            ParameterCode::WindDirection => "B00202A",
            ParameterCode::WindSpeed => "B00702A",
            ParameterCode::MaxWindSpeed => "B00703A",
            ParameterCode::Precipitation10Min => "B00608S",
            ParameterCode::DailyPrecipitation => "B00604S",
            ParameterCode::HourlyPrecipitation => "B00606S",
            ParameterCode::RelativeHumidity => "B00802A",
            ParameterCode::MaxGust => "B00714A",
            ParameterCode::SnowWaterEquivalent => "B00910A",
        }
    }

    /// Short machine-friendly name
    pub fn name(&self) -> &'static str {
        match self {
            ParameterCode::AirTemperature => "air_temperature",
            ParameterCode::GroundTemperature => "ground_temperature",
            ParameterCode::WindDirection => "wind_direction",
            ParameterCode::WindSpeed => "wind_speed",
            ParameterCode::MaxWindSpeed => "max_wind_speed",
            ParameterCode::Precipitation10Min => "precipitation_10min",
            ParameterCode::DailyPrecipitation => "daily_precipitation",
            ParameterCode::HourlyPrecipitation => "hourly_precipitation",
            ParameterCode::RelativeHumidity => "relative_humidity",
            ParameterCode::MaxGust => "max_gust",
            ParameterCode::SnowWaterEquivalent => "snow_water_equivalent",
        }
    }

    /// Standard definition (unit and aggregation) for this code
    pub fn standard_definition(&self) -> ParameterDefinition {
        use AggregationKind::*;

        let (unit, aggregation) = match self {
            ParameterCode::AirTemperature => ("°C", MeanMedian),
            ParameterCode::GroundTemperature => ("°C", MeanMedian),
            ParameterCode::WindDirection => ("°", MeanMedian),
            ParameterCode::WindSpeed => ("m/s", MeanMedian),
            ParameterCode::MaxWindSpeed => ("m/s", Max),
            ParameterCode::Precipitation10Min => ("mm", Sum),
            ParameterCode::DailyPrecipitation => ("mm", Sum),
            ParameterCode::HourlyPrecipitation => ("mm", Sum),
            ParameterCode::RelativeHumidity => ("%", MeanMedian),
            ParameterCode::MaxGust => ("m/s", Max),
            ParameterCode::SnowWaterEquivalent => ("mm", MeanMedian),
        };

        ParameterDefinition::new(*self, unit, aggregation)
    }
}

impl std::fmt::Display for ParameterCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Parameter code that is not one of the known IMGW codes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown parameter code: {0}")]
pub struct UnknownParameter(pub String);

impl FromStr for ParameterCode {
    type Err = UnknownParameter;

    /// Accepts the IMGW code (case-insensitive) or the short name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ParameterCode::all()
            .iter()
            .copied()
            .find(|p| p.code().eq_ignore_ascii_case(trimmed) || p.name() == trimmed)
            .ok_or_else(|| UnknownParameter(s.to_string()))
    }
}

/// How a parameter is reduced over a day or night period
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    /// Mean, median and trimmed mean (temperature, humidity, wind speed)
    MeanMedian,
    /// Total over the period (precipitation)
    Sum,
    /// Largest single value (gusts)
    Max,
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationKind::MeanMedian => write!(f, "mean_median"),
            AggregationKind::Sum => write!(f, "sum"),
            AggregationKind::Max => write!(f, "max"),
        }
    }
}

/// Definition of a parameter (what is measured and how it is summarised)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDefinition {
    /// Parameter code
    pub code: ParameterCode,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Unit of the stored values; results keep this unit
    pub unit: String,
    /// How to aggregate over a period
    pub aggregation: AggregationKind,
}

impl ParameterDefinition {
    /// Create a new definition with required fields
    pub fn new(code: ParameterCode, unit: impl Into<String>, aggregation: AggregationKind) -> Self {
        Self {
            code,
            name: None,
            unit: unit.into(),
            aggregation,
        }
    }

    /// Builder: set display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, falling back to the code's short name
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.code.name())
    }
}

/// Time range for queries (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a time range, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// The UTC calendar day `[date 00:00, date+1 00:00)`
    pub fn for_date(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        let end = start + chrono::Duration::days(1);
        Self {
            start: start.timestamp_millis(),
            end: end.timestamp_millis(),
        }
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}
