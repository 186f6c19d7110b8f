//! Geospatial Index - stations by administrative unit
//!
//! Built once from the imported units and stations and immutable after
//! that, so it is shared behind an `Arc` without locking.
//!
//! Construction performs the spatial join: every station is tested against
//! every unit of each level (bounding box first, then the polygon test).
//! A station is assigned to at most one unit per level. When overlapping
//! polygons both contain a station, the unit with the smallest id wins and
//! a warning is logged.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::index::error::{IndexError, IndexResult};
use crate::index::polygon::Shape;
use crate::index::types::{AdministrativeUnit, Station, UnitLevel};

struct UnitEntry {
    unit: AdministrativeUnit,
    shape: Shape,
}

impl UnitEntry {
    fn contains(&self, station: &Station) -> bool {
        self.shape.contains(station.location())
    }
}

/// Units a station was assigned to by the spatial join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StationUnits {
    pub province: Option<String>,
    pub county: Option<String>,
}

impl StationUnits {
    fn slot(&mut self, level: UnitLevel) -> &mut Option<String> {
        match level {
            UnitLevel::Province => &mut self.province,
            UnitLevel::County => &mut self.county,
        }
    }

    pub fn get(&self, level: UnitLevel) -> Option<&str> {
        match level {
            UnitLevel::Province => self.province.as_deref(),
            UnitLevel::County => self.county.as_deref(),
        }
    }
}

/// Statistics about the index contents
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoStats {
    pub provinces: usize,
    pub counties: usize,
    pub stations: usize,
    /// Stations outside every county
    pub unassigned_stations: usize,
    /// Units whose boundary encloses no area
    pub empty_boundaries: usize,
}

impl std::fmt::Display for GeoStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} provinces, {} counties, {} stations ({} outside any county)",
            self.provinces, self.counties, self.stations, self.unassigned_stations
        )
    }
}

/// Immutable index of administrative units and the stations they contain
pub struct GeoIndex {
    /// Sorted by unit id
    units: Vec<UnitEntry>,
    by_id: HashMap<String, usize>,
    /// Lowercased name to unit positions
    by_name: HashMap<String, Vec<usize>>,
    stations: BTreeMap<String, Station>,
    /// Unit id to member station ids
    members: HashMap<String, BTreeSet<String>>,
    assignments: HashMap<String, StationUnits>,
}

impl GeoIndex {
    /// Build the index and run the spatial join
    pub fn new(units: Vec<AdministrativeUnit>, stations: Vec<Station>) -> IndexResult<Self> {
        let mut units = units;
        units.sort_by(|a, b| a.id.cmp(&b.id));

        let mut by_id = HashMap::with_capacity(units.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut entries = Vec::with_capacity(units.len());

        for (idx, unit) in units.into_iter().enumerate() {
            if by_id.insert(unit.id.clone(), idx).is_some() {
                return Err(IndexError::DuplicateUnit(unit.id));
            }
            by_name
                .entry(unit.name.trim().to_lowercase())
                .or_default()
                .push(idx);

            let shape = unit.boundary.shape();
            if shape.is_empty() {
                tracing::warn!(unit_id = %unit.id, name = %unit.name, "Unit boundary encloses no area");
            }
            entries.push(UnitEntry { unit, shape });
        }

        let mut station_map = BTreeMap::new();
        for station in stations {
            if station_map.contains_key(&station.id) {
                return Err(IndexError::DuplicateStation(station.id));
            }
            station_map.insert(station.id.clone(), station);
        }

        let mut index = Self {
            units: entries,
            by_id,
            by_name,
            stations: station_map,
            members: HashMap::new(),
            assignments: HashMap::new(),
        };
        index.spatial_join();

        let stats = index.stats();
        tracing::info!("Geospatial index built: {}", stats);

        Ok(index)
    }

    fn spatial_join(&mut self) {
        let mut members: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut assignments = HashMap::with_capacity(self.stations.len());

        for station in self.stations.values() {
            if !station.has_valid_coordinates() {
                tracing::warn!(station_id = %station.id, "Station has invalid coordinates, skipping");
                continue;
            }

            let mut assigned = StationUnits::default();
            for &level in UnitLevel::all() {
                // Units are sorted by id, so the first match is the smallest id
                let mut matches = self
                    .units
                    .iter()
                    .filter(|e| e.unit.level == level && e.contains(station));

                if let Some(first) = matches.next() {
                    let others: Vec<&str> = matches.map(|e| e.unit.id.as_str()).collect();
                    if !others.is_empty() {
                        tracing::warn!(
                            station_id = %station.id,
                            chosen = %first.unit.id,
                            also = ?others,
                            "Station lies inside overlapping {} polygons",
                            level
                        );
                    }

                    *assigned.slot(level) = Some(first.unit.id.clone());
                    members
                        .entry(first.unit.id.clone())
                        .or_default()
                        .insert(station.id.clone());
                }
            }

            if assigned.county.is_none() {
                tracing::debug!(station_id = %station.id, "Station is outside every county");
            }
            assignments.insert(station.id.clone(), assigned);
        }

        self.members = members;
        self.assignments = assignments;
    }

    /// Look up a unit by exact id, then by case-insensitive name
    pub fn resolve(&self, key: &str) -> IndexResult<&AdministrativeUnit> {
        let key = key.trim();
        if let Some(&idx) = self.by_id.get(key) {
            return Ok(&self.units[idx].unit);
        }

        match self.by_name.get(&key.to_lowercase()).map(Vec::as_slice) {
            Some([idx]) => Ok(&self.units[*idx].unit),
            Some(many) if !many.is_empty() => Err(IndexError::AmbiguousUnit {
                name: key.to_string(),
                candidates: many.iter().map(|&i| self.units[i].unit.id.clone()).collect(),
            }),
            _ => Err(IndexError::UnitNotFound(key.to_string())),
        }
    }

    /// Stations inside `unit`, sorted by id, without duplicates
    ///
    /// Units known to the index use the spatial join. Any other unit is
    /// tested directly against every station.
    pub fn stations_in(&self, unit: &AdministrativeUnit) -> Vec<Station> {
        if self.by_id.contains_key(&unit.id) {
            return self
                .members
                .get(&unit.id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| self.stations.get(id))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
        }

        let shape = unit.boundary.shape();
        self.stations
            .values()
            .filter(|s| s.has_valid_coordinates())
            .filter(|s| shape.contains(s.location()))
            .cloned()
            .collect()
    }

    /// All units of a level (or every unit), sorted by id
    pub fn units(&self, level: Option<UnitLevel>) -> Vec<&AdministrativeUnit> {
        self.units
            .iter()
            .map(|e| &e.unit)
            .filter(|u| level.map(|l| u.level == l).unwrap_or(true))
            .collect()
    }

    /// Units whose parent is `parent_id` (counties of a province)
    pub fn children(&self, parent_id: &str) -> Vec<&AdministrativeUnit> {
        self.units
            .iter()
            .map(|e| &e.unit)
            .filter(|u| u.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    /// The unit a station belongs to at `level`
    pub fn unit_of(&self, station_id: &str, level: UnitLevel) -> Option<&AdministrativeUnit> {
        let unit_id = self.assignments.get(station_id)?.get(level)?;
        self.by_id.get(unit_id).map(|&idx| &self.units[idx].unit)
    }

    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    /// All stations, sorted by id
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn stats(&self) -> GeoStats {
        let count_level = |level: UnitLevel| self.units.iter().filter(|e| e.unit.level == level).count();

        GeoStats {
            provinces: count_level(UnitLevel::Province),
            counties: count_level(UnitLevel::County),
            stations: self.stations.len(),
            unassigned_stations: self
                .stations
                .keys()
                .filter(|id| {
                    self.assignments
                        .get(*id)
                        .map(|a| a.county.is_none())
                        .unwrap_or(true)
                })
                .count(),
            empty_boundaries: self.units.iter().filter(|e| e.shape.is_empty()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::polygon::{Boundary, Ring};

    fn square(min_lon: f64, min_lat: f64, size: f64) -> Boundary {
        Boundary::from_ring(Ring::from_coords(&[
            (min_lon, min_lat),
            (min_lon + size, min_lat),
            (min_lon + size, min_lat + size),
            (min_lon, min_lat + size),
        ]))
    }

    /// Province 14 covers [20,22]x[51,53] and holds counties 1465 (west half) and 1412 (east half)
    fn fixture() -> GeoIndex {
        let units = vec![
            AdministrativeUnit::new("14", "mazowieckie", UnitLevel::Province, square(20.0, 51.0, 2.0)),
            AdministrativeUnit::new(
                "1465",
                "Warszawa",
                UnitLevel::County,
                Boundary::from_ring(Ring::from_coords(&[
                    (20.0, 51.0),
                    (21.0, 51.0),
                    (21.0, 53.0),
                    (20.0, 53.0),
                ])),
            )
            .parent("14"),
            AdministrativeUnit::new(
                "1412",
                "powiat miński",
                UnitLevel::County,
                Boundary::from_ring(Ring::from_coords(&[
                    (21.0, 51.0),
                    (22.0, 51.0),
                    (22.0, 53.0),
                    (21.0, 53.0),
                ])),
            )
            .parent("14"),
            AdministrativeUnit::new("99", "empty", UnitLevel::County, square(40.0, 40.0, 1.0)),
        ];

        let stations = vec![
            Station::new("A", "west", 52.0, 20.5),
            Station::new("B", "east", 52.0, 21.5),
            Station::new("C", "outside", 60.0, 10.0),
            Station::new("D", "west too", 51.5, 20.2),
        ];

        GeoIndex::new(units, stations).unwrap()
    }

    fn ids(stations: &[Station]) -> Vec<&str> {
        stations.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_stations_in_county() {
        let index = fixture();
        let county = index.resolve("1465").unwrap();
        assert_eq!(ids(&index.stations_in(county)), vec!["A", "D"]);

        let county = index.resolve("1412").unwrap();
        assert_eq!(ids(&index.stations_in(county)), vec!["B"]);
    }

    #[test]
    fn test_stations_in_province() {
        let index = fixture();
        let province = index.resolve("mazowieckie").unwrap();
        assert_eq!(ids(&index.stations_in(province)), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_zero_station_unit() {
        let index = fixture();
        let unit = index.resolve("99").unwrap();
        assert!(index.stations_in(unit).is_empty());
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let index = fixture();
        assert_eq!(index.resolve("WARSZAWA").unwrap().id, "1465");
        assert_eq!(index.resolve("  Powiat Miński ").unwrap().id, "1412");
    }

    #[test]
    fn test_resolve_unknown() {
        let index = fixture();
        assert!(matches!(
            index.resolve("atlantis"),
            Err(IndexError::UnitNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_ambiguous_name() {
        let units = vec![
            AdministrativeUnit::new("0203", "powiat bielski", UnitLevel::County, square(0.0, 0.0, 1.0)),
            AdministrativeUnit::new("2402", "Powiat Bielski", UnitLevel::County, square(5.0, 5.0, 1.0)),
        ];
        let index = GeoIndex::new(units, Vec::new()).unwrap();

        match index.resolve("powiat bielski") {
            Err(IndexError::AmbiguousUnit { candidates, .. }) => {
                assert_eq!(candidates, vec!["0203".to_string(), "2402".to_string()]);
            }
            other => panic!("expected ambiguity, got {:?}", other.map(|u| &u.id)),
        }

        // Ids still resolve
        assert_eq!(index.resolve("2402").unwrap().id, "2402");
    }

    #[test]
    fn test_overlap_assigns_smallest_id() {
        let units = vec![
            AdministrativeUnit::new("B", "second", UnitLevel::County, square(0.0, 0.0, 2.0)),
            AdministrativeUnit::new("A", "first", UnitLevel::County, square(1.0, 1.0, 2.0)),
        ];
        let stations = vec![Station::new("S", "overlap", 1.5, 1.5)];
        let index = GeoIndex::new(units, stations).unwrap();

        let a = index.resolve("A").unwrap();
        let b = index.resolve("B").unwrap();
        assert_eq!(ids(&index.stations_in(a)), vec!["S"]);
        assert!(index.stations_in(b).is_empty());
        assert_eq!(index.unit_of("S", UnitLevel::County).unwrap().id, "A");
    }

    #[test]
    fn test_unit_of_and_children() {
        let index = fixture();

        assert_eq!(index.unit_of("B", UnitLevel::County).unwrap().id, "1412");
        assert_eq!(index.unit_of("B", UnitLevel::Province).unwrap().id, "14");
        assert!(index.unit_of("C", UnitLevel::County).is_none());

        let children: Vec<&str> = index.children("14").iter().map(|u| u.id.as_str()).collect();
        assert_eq!(children, vec!["1412", "1465"]);
    }

    #[test]
    fn test_ad_hoc_unit_uses_direct_containment() {
        let index = fixture();
        let adhoc = AdministrativeUnit::new("x", "box", UnitLevel::County, square(20.4, 51.9, 1.2));
        assert_eq!(ids(&index.stations_in(&adhoc)), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let units = vec![
            AdministrativeUnit::new("1", "a", UnitLevel::County, square(0.0, 0.0, 1.0)),
            AdministrativeUnit::new("1", "b", UnitLevel::County, square(2.0, 2.0, 1.0)),
        ];
        assert!(matches!(
            GeoIndex::new(units, Vec::new()),
            Err(IndexError::DuplicateUnit(_))
        ));

        let stations = vec![Station::new("S", "a", 0.0, 0.0), Station::new("S", "b", 1.0, 1.0)];
        assert!(matches!(
            GeoIndex::new(Vec::new(), stations),
            Err(IndexError::DuplicateStation(_))
        ));
    }

    #[test]
    fn test_stats() {
        let stats = fixture().stats();
        assert_eq!(stats.provinces, 1);
        assert_eq!(stats.counties, 3);
        assert_eq!(stats.stations, 4);
        assert_eq!(stats.unassigned_stations, 1);
        assert_eq!(stats.empty_boundaries, 0);
    }
}
