//! Geometry engine: area, difference and bounding boxes.
//!
//! Raw areas come from the spherical ring approximation (Chamberlain and
//! Duquette). Every raw figure is multiplied by one correction factor,
//! calibrated so the reference square below measures exactly 10,000 m².

use crate::domain::{BoundingBox, Polygon, Region, Ring};
use crate::error::{GeometryError, GeometryResult};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BooleanOps, ChamberlainDuquetteArea, Coord, Intersects, Line, LineString, MultiPolygon};
use std::panic::{self, AssertUnwindSafe};

/// Square feet per square meter
pub const SQ_FT_PER_SQ_M: f64 = 10.7639;

/// Reference square near (40.0, -89.0), roughly 100 m per side
pub const CALIBRATION_SQUARE: [(f64, f64); 4] = [
    (-89.0, 40.0),
    (-89.0, 40.0009),
    (-88.9991, 40.0009),
    (-88.9991, 40.0),
];

/// Area the reference square must report after correction
pub const CALIBRATION_AREA_SQ_M: f64 = 10_000.0;

/// Rings enclosing less than this (raw m²) are treated as degenerate
const MIN_RING_AREA_SQ_M: f64 = 1e-6;

/// Convert corrected square meters to square feet, unrounded
pub fn to_square_feet(sq_m: f64) -> f64 {
    sq_m * SQ_FT_PER_SQ_M
}

/// Round a square-meter figure to reported whole square feet
pub fn report_square_feet(sq_m: f64) -> u64 {
    to_square_feet(sq_m).max(0.0).round() as u64
}

/// Outcome of subtracting one polygon from a region
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    /// The shapes do not overlap; the minuend stands as is
    Unchanged,
    /// Part of the minuend remains
    Reduced(Region),
    /// Nothing of the minuend remains
    Emptied,
    /// No valid result could be produced; callers keep the minuend
    Degenerate(GeometryError),
}

impl Difference {
    /// Fold this outcome into the running region
    pub fn apply(self, current: Region) -> Region {
        match self {
            Self::Reduced(region) => region,
            Self::Emptied => Region::empty(),
            Self::Unchanged | Self::Degenerate(_) => current,
        }
    }
}

/// Stateless geometric operations with a fixed area correction
#[derive(Debug, Clone, Copy)]
pub struct GeometryEngine {
    correction_factor: f64,
}

impl Default for GeometryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryEngine {
    /// Create an engine calibrated against the reference square
    pub fn new() -> Self {
        let reference = LineString::from(
            CALIBRATION_SQUARE
                .iter()
                .chain(CALIBRATION_SQUARE.first())
                .copied()
                .collect::<Vec<_>>(),
        );
        let raw = ring_area(&reference);
        Self {
            correction_factor: CALIBRATION_AREA_SQ_M / raw,
        }
    }

    /// Multiplier applied to every raw area figure
    pub fn correction_factor(&self) -> f64 {
        self.correction_factor
    }

    /// Uncorrected area of the outer ring in square meters
    pub fn raw_area(&self, polygon: &Polygon) -> f64 {
        ring_area(&polygon.exterior().to_line_string())
    }

    /// Corrected area in square meters; invalid polygons measure zero
    pub fn area(&self, polygon: &Polygon) -> f64 {
        match validate(polygon) {
            Ok(()) => self.raw_area(polygon) * self.correction_factor,
            Err(e) => {
                tracing::debug!("Treating invalid polygon as zero area: {}", e);
                0.0
            }
        }
    }

    /// Corrected area of a multi-part region, holes excluded
    pub fn region_area(&self, region: &Region) -> f64 {
        let raw: f64 = region
            .as_multi_polygon()
            .iter()
            .map(|part| {
                let holes: f64 = part.interiors().iter().map(ring_area).sum();
                (ring_area(part.exterior()) - holes).max(0.0)
            })
            .sum();
        raw * self.correction_factor
    }

    /// Corrected area reported in whole square feet
    pub fn square_feet(&self, polygon: &Polygon) -> u64 {
        report_square_feet(self.area(polygon))
    }

    /// Region of `minuend` not covered by `subtrahend`
    pub fn difference(&self, minuend: &Polygon, subtrahend: &Polygon) -> Difference {
        if let Err(e) = validate(minuend) {
            return Difference::Degenerate(e);
        }
        self.subtract(&Region::from(minuend), subtrahend)
    }

    /// Subtract a polygon from a running region
    pub fn subtract(&self, current: &Region, subtrahend: &Polygon) -> Difference {
        if let Err(e) = validate(subtrahend) {
            return Difference::Degenerate(e);
        }
        if current.is_empty() {
            return Difference::Unchanged;
        }

        let cutter = MultiPolygon::new(vec![subtrahend.to_geo()]);
        let overlaps = current
            .as_multi_polygon()
            .iter()
            .any(|part| part.intersects(&cutter));
        if !overlaps {
            return Difference::Unchanged;
        }

        // Boolean ops can panic on near-degenerate input.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            current.as_multi_polygon().difference(&cutter)
        }));
        let remainder = match outcome {
            Ok(mp) => Region::from(mp),
            Err(_) => {
                return Difference::Degenerate(GeometryError::BooleanOp(
                    "difference panicked".to_string(),
                ))
            }
        };

        let before = self.region_area(current);
        let after = self.region_area(&remainder);
        if !after.is_finite() || after > before * (1.0 + 1e-9) + MIN_RING_AREA_SQ_M {
            return Difference::Degenerate(GeometryError::BooleanOp(format!(
                "difference grew the region from {before:.3} to {after:.3} m²"
            )));
        }
        if remainder.is_empty() || after <= MIN_RING_AREA_SQ_M {
            Difference::Emptied
        } else if (before - after).abs() <= MIN_RING_AREA_SQ_M {
            Difference::Unchanged
        } else {
            Difference::Reduced(remainder)
        }
    }

    /// Extent of the polygon's outer ring
    pub fn bounding_box(&self, polygon: &Polygon) -> BoundingBox {
        let vertices = polygon.exterior().vertices();
        let first = vertices[0];
        vertices.iter().fold(
            BoundingBox {
                west: first.lon,
                south: first.lat,
                east: first.lon,
                north: first.lat,
            },
            |bbox, c| BoundingBox {
                west: bbox.west.min(c.lon),
                south: bbox.south.min(c.lat),
                east: bbox.east.max(c.lon),
                north: bbox.north.max(c.lat),
            },
        )
    }
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    geo::Polygon::new(ring.clone(), vec![]).chamberlain_duquette_unsigned_area()
}

/// Reject rings that cross themselves or enclose nothing
pub fn validate(polygon: &Polygon) -> GeometryResult<()> {
    check_simple(polygon.exterior())?;
    if ring_area(&polygon.exterior().to_line_string()) < MIN_RING_AREA_SQ_M {
        return Err(GeometryError::ZeroArea);
    }
    Ok(())
}

fn check_simple(ring: &Ring) -> GeometryResult<()> {
    let segments: Vec<Line<f64>> = ring
        .points()
        .windows(2)
        .map(|w| Line::new(Coord::from(w[0]), Coord::from(w[1])))
        .collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return Err(GeometryError::SelfIntersection { first: i, second: j }),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(west: f64, south: f64, east: f64, north: f64) -> Polygon {
        Polygon::from_coords([(west, south), (west, north), (east, north), (east, south)]).unwrap()
    }

    fn calibration() -> Polygon {
        Polygon::from_coords(CALIBRATION_SQUARE).unwrap()
    }

    #[test]
    fn test_calibration_square_measures_ten_thousand() {
        let engine = GeometryEngine::new();
        let area = engine.area(&calibration());
        assert!((area - 10_000.0).abs() < 1e-6, "area was {area}");
    }

    #[test]
    fn test_correction_factor_is_not_identity() {
        let engine = GeometryEngine::new();
        assert!((engine.correction_factor() - 1.0).abs() > 0.01);
        assert!(engine.raw_area(&calibration()) > 0.0);
    }

    #[test]
    fn test_area_ignores_closing_point_format() {
        let engine = GeometryEngine::new();
        let open = Polygon::from_coords([(-89.0, 40.0), (-89.0, 40.001), (-88.999, 40.0)]).unwrap();
        let closed = Polygon::from_coords([
            (-89.0, 40.0),
            (-89.0, 40.001),
            (-88.999, 40.0),
            (-89.0, 40.0),
        ])
        .unwrap();
        assert_eq!(engine.area(&open), engine.area(&closed));
    }

    #[test]
    fn test_area_ignores_winding() {
        let engine = GeometryEngine::new();
        let mut reversed = CALIBRATION_SQUARE;
        reversed.reverse();
        let reversed = Polygon::from_coords(reversed).unwrap();
        assert!((engine.area(&reversed) - engine.area(&calibration())).abs() < 1e-6);
    }

    #[test]
    fn test_square_feet_conversion() {
        let engine = GeometryEngine::new();
        assert_eq!(engine.square_feet(&calibration()), 107_639);
        assert_eq!(report_square_feet(1_000.0), 10_764);
        assert_eq!(report_square_feet(-5.0), 0);
    }

    #[test]
    fn test_self_intersecting_polygon_measures_zero() {
        let engine = GeometryEngine::new();
        let bowtie =
            Polygon::from_coords([(-89.0, 40.0), (-88.999, 40.001), (-88.999, 40.0), (-89.0, 40.001)])
                .unwrap();
        assert!(matches!(
            validate(&bowtie),
            Err(GeometryError::SelfIntersection { .. })
        ));
        assert_eq!(engine.area(&bowtie), 0.0);
    }

    #[test]
    fn test_collinear_polygon_measures_zero() {
        let engine = GeometryEngine::new();
        let flat = Polygon::from_coords([(-89.0, 40.0), (-88.9995, 40.0), (-88.999, 40.0)]).unwrap();
        assert_eq!(engine.area(&flat), 0.0);
    }

    #[test]
    fn test_self_difference_is_empty() {
        let engine = GeometryEngine::new();
        let p = calibration();
        assert_eq!(engine.difference(&p, &p), Difference::Emptied);
    }

    #[test]
    fn test_disjoint_difference_is_unchanged() {
        let engine = GeometryEngine::new();
        let p = calibration();
        let far = rect(-88.99, 40.01, -88.98, 40.02);
        assert_eq!(engine.difference(&p, &far), Difference::Unchanged);
        assert_eq!(
            engine.difference(&p, &far).apply(Region::from(&p)),
            Region::from(&p)
        );
    }

    #[test]
    fn test_contained_difference_leaves_hole() {
        let engine = GeometryEngine::new();
        let p = calibration();
        let inner = rect(-88.9996, 40.0003, -88.9993, 40.0006);

        let expected = engine.area(&p) - engine.area(&inner);
        match engine.difference(&p, &inner) {
            Difference::Reduced(region) => {
                let area = engine.region_area(&region);
                assert!((area - expected).abs() < 1.0, "area {area} vs {expected}");
                assert!((area - 10_000.0 * 8.0 / 9.0).abs() < 5.0);
            }
            other => panic!("expected reduced region, got {other:?}"),
        }
    }

    #[test]
    fn test_covering_difference_is_empty() {
        let engine = GeometryEngine::new();
        let p = calibration();
        let cover = rect(-89.001, 39.999, -88.998, 40.002);
        assert_eq!(engine.difference(&p, &cover), Difference::Emptied);
    }

    #[test]
    fn test_degenerate_subtrahend_keeps_minuend() {
        let engine = GeometryEngine::new();
        let p = calibration();
        let bowtie =
            Polygon::from_coords([(-89.0, 40.0), (-88.999, 40.001), (-88.999, 40.0), (-89.0, 40.001)])
                .unwrap();

        let outcome = engine.difference(&p, &bowtie);
        assert!(matches!(outcome, Difference::Degenerate(_)));
        assert_eq!(outcome.apply(Region::from(&p)), Region::from(&p));
    }

    #[test]
    fn test_partial_overlap_reduces_area() {
        let engine = GeometryEngine::new();
        let p = calibration();
        let west_half_cover = rect(-89.001, 39.999, -88.99955, 40.002);

        match engine.difference(&p, &west_half_cover) {
            Difference::Reduced(region) => {
                let area = engine.region_area(&region);
                assert!((area - 5_000.0).abs() < 5.0, "area was {area}");
            }
            other => panic!("expected reduced region, got {other:?}"),
        }
    }

    #[test]
    fn test_bounding_box() {
        let engine = GeometryEngine::new();
        let bbox = engine.bounding_box(&calibration());
        assert_eq!(bbox.west, -89.0);
        assert_eq!(bbox.south, 40.0);
        assert_eq!(bbox.east, -88.9991);
        assert_eq!(bbox.north, 40.0009);
    }
}
