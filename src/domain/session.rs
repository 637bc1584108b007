//! Session state carried through one estimation attempt.

use super::{Coordinate, Polygon};
use serde::{Deserialize, Serialize};

/// Phase of the capture workflow, in required order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    AddressEntry,
    PropertyDrawing,
    ExclusionsDrawing,
    Result,
}

impl Phase {
    /// Get the display name for this phase
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AddressEntry => "address entry",
            Self::PropertyDrawing => "property drawing",
            Self::ExclusionsDrawing => "exclusions drawing",
            Self::Result => "result",
        }
    }

    /// Position in the required order, starting at 0
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::AddressEntry => 0,
            Self::PropertyDrawing => 1,
            Self::ExclusionsDrawing => 2,
            Self::Result => 3,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::AddressEntry
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Kind of external call the workflow can have in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Geocode,
    Buildings,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geocode => write!(f, "geocode"),
            Self::Buildings => write!(f, "building data"),
        }
    }
}

/// Mutable state of one estimation attempt.
///
/// Only the capture workflow mutates it; `Default` is the freshly
/// restarted state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Address as resolved by the last successful lookup
    pub address: Option<String>,
    /// Map focus from the last successful lookup
    pub focus: Option<Coordinate>,
    /// Property boundary while drawing it
    pub property_polygon: Option<Polygon>,
    /// Exclusion shape while drawing it
    pub exclusion_polygon: Option<Polygon>,
    /// Property area saved when leaving property drawing
    pub property_area_sq_ft: Option<u64>,
    /// Net area once the result phase is reached
    pub final_area_sq_ft: Option<u64>,
    /// Current phase
    pub phase: Phase,
}

/// Reported estimate, recomputed wholesale on every entry into the result phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaResult {
    pub area_sq_ft: u64,
    pub estimated_minutes: u64,
}

impl AreaResult {
    /// Derive the estimate from a net area and a mowing rate
    pub fn new(area_sq_ft: u64, sq_ft_per_minute: u64) -> Self {
        Self {
            area_sq_ft,
            estimated_minutes: area_sq_ft.div_ceil(sq_ft_per_minute.max(1)),
        }
    }
}

impl std::fmt::Display for AreaResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sq ft, est. time: {} minutes",
            self.area_sq_ft, self.estimated_minutes
        )
    }
}
