//! lawn-estimator: mowable lawn area from drawn property polygons
//!
//! This crate measures a property boundary, subtracts user-declared
//! exclusions (and, on request, building footprints), and reports the
//! result in square feet with an estimated mowing time.

pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod workflow;

pub use config::EstimatorConfig;
pub use error::{AppError, Result};
pub use workflow::CaptureWorkflow;
