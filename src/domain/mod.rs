//! Domain entities for lawn-estimator.
//!
//! This module contains the core value types:
//! - Geometry: coordinates, closed rings, polygons, regions
//! - Features: feature collections and building footprints
//! - Session: capture phases, session state, the reported estimate

mod features;
mod geometry;
mod session;

pub use features::{
    filter_buildings, parse_polygon, BuildingFootprint, Feature, FeatureCollection, Geometry, Position,
};
pub use geometry::{BoundingBox, Coordinate, Polygon, Region, Ring};
pub use session::{AreaResult, CallKind, Phase, SessionState};
