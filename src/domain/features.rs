//! Geographic feature collections and building footprints.

use super::{Coordinate, Polygon, Ring};
use crate::error::{AppError, GeometryError, GeometryResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A position as it appears on the wire: `[lon, lat, ...]`
pub type Position = Vec<f64>;

/// Geometry of a feature, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

impl Geometry {
    /// Outer rings of every polygon this geometry contains
    pub fn polygons(&self) -> Vec<GeometryResult<Polygon>> {
        match self {
            Self::Polygon { coordinates } => vec![outer_ring(coordinates)],
            Self::MultiPolygon { coordinates } => coordinates.iter().map(|p| outer_ring(p)).collect(),
            _ => Vec::new(),
        }
    }

    /// Check whether this is a polygon or multi-polygon
    pub fn is_polygonal(&self) -> bool {
        matches!(self, Self::Polygon { .. } | Self::MultiPolygon { .. })
    }
}

fn outer_ring(rings: &[Vec<Position>]) -> GeometryResult<Polygon> {
    let outer = rings.first().ok_or(GeometryError::TooFewPoints {
        required: Ring::MIN_VERTICES,
        found: 0,
    })?;
    let coords = outer
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Coordinate::new(p[0], p[1]))
        .collect();
    Ok(Polygon::new(Ring::new(coords)?))
}

/// A single feature with arbitrary properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    /// Check whether the feature's properties mark it as a building
    pub fn is_building(&self) -> bool {
        let Some(value) = self.properties.as_ref().and_then(|p| p.get("building")) else {
            return false;
        };
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty() && s != "no",
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// A heterogeneous collection of features, possibly empty
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Collection with no features
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check whether the collection has no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A polygon tagged as a building; immutable once ingested
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingFootprint {
    polygon: Polygon,
    source_id: Option<String>,
}

impl BuildingFootprint {
    /// Footprint outline
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// Identifier carried by the source feature, if any
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }
}

/// Select building footprints from a feature collection.
///
/// Keeps features marked as buildings with polygonal geometry, one footprint
/// per constituent polygon, in input order. Rings too degenerate to form a
/// polygon are dropped.
pub fn filter_buildings(collection: &FeatureCollection) -> Vec<BuildingFootprint> {
    let mut footprints = Vec::new();

    for feature in &collection.features {
        if !feature.is_building() {
            continue;
        }
        let Some(geometry) = feature.geometry.as_ref().filter(|g| g.is_polygonal()) else {
            continue;
        };
        let source_id = feature
            .properties
            .as_ref()
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        for polygon in geometry.polygons() {
            match polygon {
                Ok(polygon) => footprints.push(BuildingFootprint {
                    polygon,
                    source_id: source_id.clone(),
                }),
                Err(e) => {
                    tracing::debug!("Dropping building part {:?}: {}", source_id, e);
                }
            }
        }
    }

    footprints
}

/// Read the first polygon from GeoJSON text.
///
/// Accepts a bare geometry, a feature, or a feature collection.
pub fn parse_polygon(json: &str) -> crate::Result<Polygon> {
    let value: Value = serde_json::from_str(json)?;
    let geometry = match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => serde_json::from_value::<FeatureCollection>(value)?
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .find(Geometry::is_polygonal),
        Some("Feature") => serde_json::from_value::<Feature>(value)?.geometry,
        _ => Some(serde_json::from_value::<Geometry>(value)?),
    };

    let polygon = geometry
        .as_ref()
        .and_then(|g| g.polygons().into_iter().next())
        .ok_or_else(|| AppError::input("no polygon found in GeoJSON input"))?;
    Ok(polygon?)
}
