//! Services for lawn-estimator.
//!
//! This module contains:
//! - GeometryEngine: area, difference and bounding boxes
//! - Geocoding: HTTP geocoder and the optional address-assist capability
//! - Buildings: building footprint providers with ordered fallback
//! - FootprintEstimator: the building-subtraction estimate

mod buildings;
mod footprint;
mod geocode;
pub mod geometry;
pub mod osm;

#[cfg(test)]
mod test_server;

pub use buildings::{
    overpass_query, BuildingDataClient, BuildingProvider, OverpassProvider, ProviderChain,
};
pub use footprint::{FootprintEstimate, FootprintEstimator, SubtractionOutcome, SubtractionRecord};
pub use geocode::{
    first_match, AddressAssist, AssistInstaller, AssistSlot, GeocodeCandidate, GeocodingClient,
    HttpGeocoder, Located, Locator, PlaceSuggestion,
};
pub use geometry::{
    report_square_feet, to_square_feet, Difference, GeometryEngine, CALIBRATION_SQUARE,
    SQ_FT_PER_SQ_M,
};
