//! Building-subtraction estimate.
//!
//! Distinct from the capture workflow's scalar estimate: here the exclusion
//! and every building footprint are cut out of the property polygon by true
//! geometric difference, and the area is measured once at the end.

use super::buildings::BuildingDataClient;
use super::geometry::{report_square_feet, validate, Difference, GeometryEngine};
use crate::domain::{filter_buildings, AreaResult, BoundingBox, BuildingFootprint, Polygon, Region};
use crate::error::GeometryError;

/// What happened to one subtraction step
#[derive(Debug, Clone, PartialEq)]
pub enum SubtractionOutcome {
    /// The shape was cut out of the running region
    Applied,
    /// The shape did not overlap; nothing changed
    NoOverlap,
    /// The shape could not be subtracted; the running region was kept
    Skipped(GeometryError),
}

/// One subtraction step and its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct SubtractionRecord {
    pub label: String,
    pub outcome: SubtractionOutcome,
}

/// Result of the building-subtraction estimate
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintEstimate {
    /// Corrected area of what remains, square meters
    pub area_sq_m: f64,
    /// Reported figure
    pub result: AreaResult,
    /// Footprints received for the property's bounding box
    pub buildings_considered: usize,
    /// Per-step outcomes, exclusion first
    pub records: Vec<SubtractionRecord>,
}

impl FootprintEstimate {
    /// Number of steps that changed the region
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, SubtractionOutcome::Applied))
    }

    /// Number of steps that failed and were skipped
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SubtractionOutcome::Skipped(_)))
    }

    fn count(&self, pred: impl Fn(&SubtractionOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Runs the building-subtraction estimate
#[derive(Debug, Clone, Copy)]
pub struct FootprintEstimator {
    engine: GeometryEngine,
    sq_ft_per_minute: u64,
}

impl FootprintEstimator {
    /// Create an estimator with a mowing rate in square feet per minute
    pub fn new(engine: GeometryEngine, sq_ft_per_minute: u64) -> Self {
        Self {
            engine,
            sq_ft_per_minute,
        }
    }

    /// Fetch buildings around the property, then estimate
    pub async fn estimate_with_client(
        &self,
        property: &Polygon,
        exclusion: Option<&Polygon>,
        client: &dyn BuildingDataClient,
    ) -> FootprintEstimate {
        let bbox = self.engine.bounding_box(property);
        let collection = client.fetch_buildings(&bbox).await;
        let buildings = filter_buildings(&collection);
        tracing::info!("Found {} building(s) to exclude", buildings.len());
        self.estimate(property, exclusion, &buildings, &bbox)
    }

    /// Subtract the exclusion, then each footprint overlapping `query_bbox`.
    ///
    /// A failing subtraction is recorded as skipped and never aborts the run.
    pub fn estimate(
        &self,
        property: &Polygon,
        exclusion: Option<&Polygon>,
        buildings: &[BuildingFootprint],
        query_bbox: &BoundingBox,
    ) -> FootprintEstimate {
        let mut records = Vec::new();
        let mut region = match validate(property) {
            Ok(()) => Region::from(property),
            Err(e) => {
                tracing::warn!("Property polygon is unusable, measuring zero: {}", e);
                Region::empty()
            }
        };

        if let Some(exclusion) = exclusion {
            region = self.step(region, exclusion, "exclusion".to_string(), &mut records);
        }

        for (index, building) in buildings.iter().enumerate() {
            let label = building
                .source_id()
                .map(str::to_string)
                .unwrap_or_else(|| format!("building #{index}"));
            if !self.engine.bounding_box(building.polygon()).intersects(query_bbox) {
                records.push(SubtractionRecord {
                    label,
                    outcome: SubtractionOutcome::NoOverlap,
                });
                continue;
            }
            region = self.step(region, building.polygon(), label, &mut records);
        }

        let area_sq_m = self.engine.region_area(&region);
        let result = AreaResult::new(report_square_feet(area_sq_m), self.sq_ft_per_minute);
        tracing::info!("Final lawn area: {} sq ft", result.area_sq_ft);

        FootprintEstimate {
            area_sq_m,
            result,
            buildings_considered: buildings.len(),
            records,
        }
    }

    fn step(
        &self,
        region: Region,
        shape: &Polygon,
        label: String,
        records: &mut Vec<SubtractionRecord>,
    ) -> Region {
        let difference = self.engine.subtract(&region, shape);
        let outcome = match &difference {
            Difference::Reduced(_) | Difference::Emptied => SubtractionOutcome::Applied,
            Difference::Unchanged => SubtractionOutcome::NoOverlap,
            Difference::Degenerate(e) => {
                tracing::debug!("Skipping subtraction of {}: {}", label, e);
                SubtractionOutcome::Skipped(e.clone())
            }
        };
        records.push(SubtractionRecord { label, outcome });
        difference.apply(region)
    }
}
