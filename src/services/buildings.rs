//! Building footprint data with ordered multi-provider fallback.
//!
//! The core only ever sees "have data" or "have none": provider failures
//! are logged and the next provider is tried, and an exhausted chain
//! yields an empty collection.

use super::osm::{to_feature_collection, OverpassResponse};
use crate::config::BuildingsConfig;
use crate::domain::{BoundingBox, FeatureCollection};
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Resolves a bounding box to raw building features; never fails
#[async_trait]
pub trait BuildingDataClient: Send + Sync {
    async fn fetch_buildings(&self, bbox: &BoundingBox) -> FeatureCollection;
}

/// One upstream source of building data
#[async_trait]
pub trait BuildingProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fetch features inside the box
    async fn fetch(&self, bbox: &BoundingBox) -> std::result::Result<FeatureCollection, ProviderError>;
}

/// Providers tried in order until one answers
pub struct ProviderChain {
    providers: Vec<Box<dyn BuildingProvider>>,
}

impl ProviderChain {
    /// Create a chain from providers in priority order
    pub fn new(providers: Vec<Box<dyn BuildingProvider>>) -> Self {
        Self { providers }
    }

    /// Build an Overpass chain from configuration
    pub fn from_config(config: &BuildingsConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lawn-estimator/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let providers = config
            .providers
            .iter()
            .map(|endpoint| {
                Box::new(OverpassProvider::new(
                    http.clone(),
                    endpoint.clone(),
                    config.query_timeout_seconds,
                )) as Box<dyn BuildingProvider>
            })
            .collect();
        Ok(Self::new(providers))
    }

    /// Number of configured providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check whether no providers are configured
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl BuildingDataClient for ProviderChain {
    async fn fetch_buildings(&self, bbox: &BoundingBox) -> FeatureCollection {
        for provider in &self.providers {
            match provider.fetch(bbox).await {
                Ok(collection) => {
                    tracing::debug!(
                        "{} returned {} feature(s)",
                        provider.name(),
                        collection.features.len()
                    );
                    return collection;
                }
                Err(e) => {
                    tracing::warn!("Building provider {} failed: {}", provider.name(), e);
                }
            }
        }

        tracing::warn!("All building providers failed; proceeding without buildings");
        FeatureCollection::empty()
    }
}

/// Overpass QL query for buildings inside the box
pub fn overpass_query(bbox: &BoundingBox, timeout_seconds: u64) -> String {
    let area = bbox.to_query_param();
    format!(
        "[out:json][timeout:{timeout_seconds}];(way[\"building\"]({area});relation[\"building\"]({area}););out body;>;out skel qt;"
    )
}

/// Overpass interpreter endpoint
pub struct OverpassProvider {
    http: reqwest::Client,
    endpoint: String,
    query_timeout_seconds: u64,
}

impl OverpassProvider {
    /// Create a provider for one interpreter endpoint
    pub fn new(http: reqwest::Client, endpoint: String, query_timeout_seconds: u64) -> Self {
        Self {
            http,
            endpoint,
            query_timeout_seconds,
        }
    }
}

#[async_trait]
impl BuildingProvider for OverpassProvider {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, bbox: &BoundingBox) -> std::result::Result<FeatureCollection, ProviderError> {
        let query = overpass_query(bbox, self.query_timeout_seconds);
        let response = self
            .http
            .post(&self.endpoint)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                endpoint: self.endpoint.clone(),
                status: response.status().as_u16(),
            });
        }

        let payload: OverpassResponse =
            response.json().await.map_err(|e| ProviderError::Payload {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(to_feature_collection(&payload))
    }
}
