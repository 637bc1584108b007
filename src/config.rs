//! Configuration management for lawn-estimator.
//!
//! Supports layered configuration: defaults → project → user → env

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".lawn-estimator.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default)]
    pub geocode: GeocodeConfig,
    #[serde(default)]
    pub buildings: BuildingsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub estimate: EstimateConfig,
}

impl EstimatorConfig {
    /// Load configuration with hierarchy: defaults → project → user → env
    pub fn load(project_root: Option<&Path>) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder();

        // 1. Start with defaults
        builder = builder.add_source(
            config::File::from_str(
                include_str!("../default_config.toml"),
                config::FileFormat::Toml,
            )
            .required(false),
        );

        // 2. Project-specific config (.lawn-estimator.toml in project root)
        if let Some(root) = project_root {
            let project_config = root.join(PROJECT_CONFIG_FILE);
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }
        }

        // 3. User config (~/.config/lawn-estimator/config.toml)
        if let Some(config_dir) =
            directories::ProjectDirs::from("com", "lawn-estimator", "lawn-estimator")
        {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(File::from(user_config).required(false));
            }
        }

        // 4. Environment variables (LAWN_ESTIMATOR__*)
        builder = builder.add_source(
            Environment::with_prefix("LAWN_ESTIMATOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load an explicit file on top of the defaults
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../default_config.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::from(path.to_path_buf()))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the estimator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.estimate.sq_ft_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "estimate.sq_ft_per_minute must be positive".to_string(),
            ));
        }
        if self.geocode.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "geocode.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Geocoding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Search endpoint URL
    #[serde(default = "default_geocode_endpoint")]
    pub endpoint: String,
    /// User-Agent sent with every lookup
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept-Language sent with every lookup
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Comma-separated ISO country codes to restrict matches to
    #[serde(default = "default_country_codes")]
    pub country_codes: String,
    /// Shorter queries are rejected before dispatch
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocode_endpoint(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            country_codes: default_country_codes(),
            min_query_len: default_min_query_len(),
        }
    }
}

fn default_geocode_endpoint() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_user_agent() -> String {
    "lawn-estimator/1.0".to_string()
}

fn default_accept_language() -> String {
    "en".to_string()
}

fn default_country_codes() -> String {
    "us".to_string()
}

fn default_min_query_len() -> usize {
    3
}

/// Building footprint providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingsConfig {
    /// Overpass interpreter endpoints, tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,
    /// Server-side timeout embedded in the Overpass query
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,
}

impl Default for BuildingsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            query_timeout_seconds: default_query_timeout_seconds(),
        }
    }
}

fn default_providers() -> Vec<String> {
    vec![
        "https://overpass-api.de/api/interpreter".to_string(),
        "https://overpass.openstreetmap.ru/api/interpreter".to_string(),
        "https://overpass.kumi.systems/api/interpreter".to_string(),
    ]
}

fn default_query_timeout_seconds() -> u64 {
    25
}

/// Transport settings shared by the HTTP collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl HttpConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Estimate reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Mowing rate used for the time estimate
    #[serde(default = "default_sq_ft_per_minute")]
    pub sq_ft_per_minute: u64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            sq_ft_per_minute: default_sq_ft_per_minute(),
        }
    }
}

fn default_sq_ft_per_minute() -> u64 {
    250
}

/// Resolve the project root used for the project config layer
pub fn project_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
