//! Station and administrative unit records

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::index::error::IndexError;
use crate::index::polygon::{Boundary, GeoPoint};

/// A weather station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// IMGW station code
    pub id: String,
    pub name: String,
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }

    /// Finite and inside the WGS84 range
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Containment level of an administrative unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum UnitLevel {
    /// Województwo
    Province,
    /// Powiat
    County,
}

impl UnitLevel {
    pub fn all() -> &'static [UnitLevel] {
        &[UnitLevel::Province, UnitLevel::County]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitLevel::Province => "province",
            UnitLevel::County => "county",
        }
    }
}

impl std::fmt::Display for UnitLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UnitLevel {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "province" | "wojewodztwo" | "województwo" => Ok(UnitLevel::Province),
            "county" | "powiat" => Ok(UnitLevel::County),
            other => Err(IndexError::InvalidLevel(other.to_string())),
        }
    }
}

/// A province or county
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrativeUnit {
    /// TERYT code or other stable identifier
    pub id: String,
    pub name: String,
    pub level: UnitLevel,
    /// Owning province of a county
    #[serde(default)]
    pub parent_id: Option<String>,
    pub boundary: Boundary,
}

impl AdministrativeUnit {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        level: UnitLevel,
        boundary: Boundary,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            parent_id: None,
            boundary,
        }
    }

    /// Builder: set the owning unit
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!("province".parse::<UnitLevel>().unwrap(), UnitLevel::Province);
        assert_eq!("Powiat".parse::<UnitLevel>().unwrap(), UnitLevel::County);
        assert_eq!("województwo".parse::<UnitLevel>().unwrap(), UnitLevel::Province);
        assert!("gmina".parse::<UnitLevel>().is_err());
    }

    #[test]
    fn test_station_coordinates() {
        assert!(Station::new("1", "a", 52.0, 21.0).has_valid_coordinates());
        assert!(!Station::new("2", "b", 95.0, 21.0).has_valid_coordinates());
        assert!(!Station::new("3", "c", f64::NAN, 21.0).has_valid_coordinates());
    }
}
