//! Planar geometry value types: coordinates, closed rings, polygons.

use crate::error::{GeometryError, GeometryResult};
use geo::{Coord, LineString, MultiPolygon};
use serde::{Deserialize, Serialize};

/// A (longitude, latitude) pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Create a coordinate from longitude and latitude
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lon, y: c.lat }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

/// A closed sequence of coordinates.
///
/// The closing point is appended on construction when the input omits it,
/// so a ring built from `[a, b, c]` and one built from `[a, b, c, a]` are
/// identical.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring(Vec<Coordinate>);

impl Ring {
    /// Minimum number of distinct vertices
    pub const MIN_VERTICES: usize = 3;

    /// Build a closed ring, rejecting non-finite or degenerate input
    pub fn new(mut points: Vec<Coordinate>) -> GeometryResult<Self> {
        if let Some(bad) = points.iter().find(|c| !c.is_finite()) {
            return Err(GeometryError::NonFinite {
                lon: bad.lon,
                lat: bad.lat,
            });
        }

        points.dedup();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < Self::MIN_VERTICES {
            return Err(GeometryError::TooFewPoints {
                required: Self::MIN_VERTICES,
                found: points.len(),
            });
        }

        let first = points[0];
        points.push(first);
        Ok(Self(points))
    }

    /// All points, closing point included
    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    /// Distinct vertices (closing point excluded)
    pub fn vertices(&self) -> &[Coordinate] {
        &self.0[..self.0.len() - 1]
    }

    /// Convert into a `geo` line string
    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::new(self.0.iter().copied().map(Coord::from).collect())
    }
}

/// A simple polygon: one outer ring, no holes
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Ring,
}

impl Polygon {
    /// Create a polygon from its outer ring
    pub fn new(exterior: Ring) -> Self {
        Self { exterior }
    }

    /// Build a polygon from raw (lon, lat) pairs
    pub fn from_coords<I>(coords: I) -> GeometryResult<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let ring = Ring::new(coords.into_iter().map(Coordinate::from).collect())?;
        Ok(Self::new(ring))
    }

    /// The outer ring
    pub fn exterior(&self) -> &Ring {
        &self.exterior
    }

    /// Convert into a `geo` polygon
    pub fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(self.exterior.to_line_string(), vec![])
    }
}

/// Axis-aligned extent in degrees, always derived from a polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Format as `south,west,north,east`, the order building queries expect
    pub fn to_query_param(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }

    /// Check whether two boxes share any area or edge
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

/// Result of subtracting shapes from a polygon.
///
/// May hold several parts and holes; its area is the sum of the parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Region(MultiPolygon<f64>);

impl Region {
    /// Region with no area
    pub fn empty() -> Self {
        Self(MultiPolygon::new(vec![]))
    }

    /// Check whether the region has no parts left
    pub fn is_empty(&self) -> bool {
        self.0 .0.is_empty()
    }

    /// Number of disjoint parts
    pub fn part_count(&self) -> usize {
        self.0 .0.len()
    }

    /// Borrow the underlying multi-polygon
    pub fn as_multi_polygon(&self) -> &MultiPolygon<f64> {
        &self.0
    }
}

impl From<&Polygon> for Region {
    fn from(polygon: &Polygon) -> Self {
        Self(MultiPolygon::new(vec![polygon.to_geo()]))
    }
}

impl From<MultiPolygon<f64>> for Region {
    fn from(mp: MultiPolygon<f64>) -> Self {
        Self(mp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_closes_open_input() {
        let open = Ring::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(1.0, 1.0),
        ])
        .unwrap();
        let closed = Ring::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(0.0, 0.0),
        ])
        .unwrap();

        assert_eq!(open, closed);
        assert_eq!(open.points().len(), 4);
        assert_eq!(open.points().first(), open.points().last());
        assert_eq!(open.vertices().len(), 3);
    }

    #[test]
    fn test_ring_rejects_too_few_points() {
        let err = Ring::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(0.0, 0.0),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            GeometryError::TooFewPoints {
                required: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_ring_ignores_repeated_points() {
        let ring = Ring::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 1.0),
        ])
        .unwrap();
        assert_eq!(ring.vertices().len(), 3);
    }

    #[test]
    fn test_ring_rejects_non_finite() {
        let err = Ring::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(f64::NAN, 0.0),
            Coordinate::new(1.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, GeometryError::NonFinite { .. }));
    }

    #[test]
    fn test_bbox_query_param_order() {
        let bbox = BoundingBox {
            west: -89.0,
            south: 40.0,
            east: -88.9991,
            north: 40.0009,
        };
        assert_eq!(bbox.to_query_param(), "40,-89,40.0009,-88.9991");
    }

    #[test]
    fn test_region_from_polygon() {
        let polygon = Polygon::from_coords([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]).unwrap();
        let region = Region::from(&polygon);
        assert_eq!(region.part_count(), 1);
        assert!(!region.is_empty());
        assert!(Region::empty().is_empty());
    }
}
