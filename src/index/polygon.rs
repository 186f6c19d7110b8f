//! Polygon containment
//!
//! Boundaries are one or more closed rings of (longitude, latitude) pairs,
//! stored without a shell/hole distinction. Each usable ring becomes one
//! `geo::Polygon` and containment combines them with an **even-odd** rule:
//! the point is inside when an odd number of rings contain it.
//!
//! Consequences:
//! - a ring nested in another ring is a hole, and disjoint rings are
//!   separate parts of the unit, with no special casing;
//! - within one ring `geo` classifies by winding number, so both lobes of a
//!   self-intersecting (bowtie) ring are inside and an area the ring loops
//!   around twice is inside as well;
//! - points on a ring's edge are not contained by that ring;
//! - rings with fewer than three distinct vertices, or with non-finite
//!   coordinates, contain nothing.
//!
//! Coordinates are treated as planar. Polish administrative boundaries are
//! small enough that the error against a geodesic test is negligible.

use geo::{BoundingRect, Contains, Coord, Intersects, LineString, MultiPolygon, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    /// Longitude in degrees east
    pub lon: f64,
    /// Latitude in degrees north
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(p: GeoPoint) -> Self {
        [p.lon, p.lat]
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(p: GeoPoint) -> Self {
        Coord { x: p.lon, y: p.lat }
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.lon, p.lat)
    }
}

/// A closed ring. The closing edge from the last vertex back to the first is
/// implied; repeating the first vertex at the end is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring {
    pub points: Vec<GeoPoint>,
}

impl Ring {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    /// Build from `(lon, lat)` pairs
    pub fn from_coords(coords: &[(f64, f64)]) -> Self {
        Self::new(coords.iter().map(|&(lon, lat)| GeoPoint::new(lon, lat)).collect())
    }

    /// True when the ring cannot enclose any area
    pub fn is_degenerate(&self) -> bool {
        if self.points.iter().any(|p| !p.is_finite()) {
            return true;
        }

        let mut distinct: Vec<GeoPoint> = Vec::with_capacity(3);
        for p in &self.points {
            if !distinct.contains(p) {
                distinct.push(*p);
                if distinct.len() == 3 {
                    return false;
                }
            }
        }
        true
    }

    /// The ring as a polygon without interiors; `geo` closes it
    fn to_polygon(&self) -> Polygon<f64> {
        let exterior: LineString<f64> = self.points.iter().map(|&p| Coord::from(p)).collect();
        Polygon::new(exterior, Vec::new())
    }
}

/// Boundary of an administrative unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Boundary {
    pub rings: Vec<Ring>,
}

impl Boundary {
    pub fn new(rings: Vec<Ring>) -> Self {
        Self { rings }
    }

    /// Single-ring boundary
    pub fn from_ring(ring: Ring) -> Self {
        Self { rings: vec![ring] }
    }

    /// Rings that can enclose area
    fn usable_rings(&self) -> impl Iterator<Item = &Ring> {
        self.rings.iter().filter(|r| !r.is_degenerate())
    }

    /// Geometry for repeated containment tests
    pub fn shape(&self) -> Shape {
        let parts: MultiPolygon<f64> = self.usable_rings().map(Ring::to_polygon).collect();
        let bbox = parts.bounding_rect();
        Shape { parts, bbox }
    }
}

/// A boundary converted to `geo` geometry, one polygon per usable ring
#[derive(Debug, Clone)]
pub struct Shape {
    parts: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl Shape {
    pub fn is_empty(&self) -> bool {
        self.bbox.is_none()
    }

    /// Even-odd combination of the per-ring tests, after a bounding box check
    pub fn contains(&self, p: GeoPoint) -> bool {
        if !p.is_finite() {
            return false;
        }
        let Some(bbox) = self.bbox else {
            return false;
        };
        if !bbox.intersects(&Coord::from(p)) {
            return false;
        }

        let point = Point::from(p);
        let inside = self.parts.iter().filter(|part| part.contains(&point)).count();
        inside % 2 == 1
    }
}
