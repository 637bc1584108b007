//! Unified error types for the lawn-estimator crate.

use crate::domain::{CallKind, Phase};
use std::path::PathBuf;
use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Input error: {0}")]
    Input(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Create an input error from a string
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Geometry that cannot produce a valid result.
///
/// Never fatal: callers degrade to a no-op (difference) or zero (area).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("ring needs at least {required} distinct points, got {found}")]
    TooFewPoints { required: usize, found: usize },

    #[error("coordinate is not finite: ({lon}, {lat})")]
    NonFinite { lon: f64, lat: f64 },

    #[error("ring intersects itself between segments {first} and {second}")]
    SelfIntersection { first: usize, second: usize },

    #[error("ring encloses no area")]
    ZeroArea,

    #[error("boolean operation failed: {0}")]
    BooleanOp(String),
}

/// Address lookup errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("no match for address")]
    NotFound,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A single upstream building-data provider failing
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("unreadable payload from {endpoint}: {message}")]
    Payload { endpoint: String, message: String },
}

/// Invariant violations: a caller drove the capture workflow out of order.
///
/// Rejected deterministically; the session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("{operation} is not allowed during {phase}")]
    WrongPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("a property boundary must be drawn first")]
    MissingProperty,

    #[error("a {0} request is already in flight")]
    AlreadyPending(CallKind),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for geometry operations
pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

/// Result type alias for address lookups
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Result type alias for workflow transitions
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
