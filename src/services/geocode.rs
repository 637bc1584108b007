//! Address resolution: the HTTP geocoding client and the optional
//! address-assist capability that may come online later.

use crate::config::GeocodeConfig;
use crate::domain::Coordinate;
use crate::error::{LookupError, LookupResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Resolves free-text addresses to coordinates
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    /// Resolve an address; an empty candidate list is `LookupError::NotFound`
    async fn geocode(&self, query: &str) -> LookupResult<Coordinate>;
}

/// One match returned by the geocoding service.
///
/// Latitude and longitude usually arrive as numeric strings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeCandidate {
    pub lat: Value,
    pub lon: Value,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl GeocodeCandidate {
    /// Parse the candidate's position
    pub fn coordinate(&self) -> LookupResult<Coordinate> {
        Ok(Coordinate::new(
            parse_degrees("lon", &self.lon)?,
            parse_degrees("lat", &self.lat)?,
        ))
    }
}

fn parse_degrees(field: &str, value: &Value) -> LookupResult<f64> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| LookupError::InvalidResponse(format!("{field} is not numeric: {value}")))
}

/// Pick the first candidate, the only one the estimator uses
pub fn first_match(candidates: &[GeocodeCandidate]) -> LookupResult<Coordinate> {
    candidates
        .first()
        .ok_or(LookupError::NotFound)?
        .coordinate()
}

/// Geocoder speaking the Nominatim search API
pub struct HttpGeocoder {
    http: reqwest::Client,
    config: GeocodeConfig,
}

impl HttpGeocoder {
    /// Create a geocoder; `timeout` bounds each request
    pub fn new(config: GeocodeConfig, timeout: Duration) -> LookupResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl GeocodingClient for HttpGeocoder {
    async fn geocode(&self, query: &str) -> LookupResult<Coordinate> {
        let response = self
            .http
            .get(&self.config.endpoint)
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("limit", "1"),
                ("countrycodes", self.config.country_codes.as_str()),
                ("addressdetails", "0"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::Transport(format!(
                "geocode failed with status {}",
                response.status()
            )));
        }

        let candidates: Vec<GeocodeCandidate> = response
            .json()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;
        tracing::debug!("Geocode returned {} candidate(s) for {:?}", candidates.len(), query);
        first_match(&candidates)
    }
}

/// A place picked through the address-assist capability
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceSuggestion {
    pub formatted_address: Option<String>,
    pub location: Coordinate,
}

/// Autocomplete-style helper that becomes available asynchronously
#[async_trait]
pub trait AddressAssist: Send + Sync {
    /// Suggest a place for the query, if the helper knows one
    async fn suggest(&self, query: &str) -> Option<PlaceSuggestion>;
}

type AssistCell = Option<Arc<dyn AddressAssist>>;

/// Write side of the address-assist slot
pub struct AssistInstaller {
    tx: watch::Sender<AssistCell>,
}

impl AssistInstaller {
    /// Make the capability available to every slot holder
    pub fn install(&self, assist: Arc<dyn AddressAssist>) {
        self.tx.send_replace(Some(assist));
        tracing::debug!("Address assist became available");
    }
}

/// Read side of the address-assist slot; empty until installed
#[derive(Clone)]
pub struct AssistSlot {
    rx: watch::Receiver<AssistCell>,
}

impl AssistSlot {
    /// Create an empty slot and the handle that fills it
    pub fn pending() -> (AssistInstaller, Self) {
        let (tx, rx) = watch::channel(None);
        (AssistInstaller { tx }, Self { rx })
    }

    /// A slot that never becomes available
    pub fn unavailable() -> Self {
        Self::pending().1
    }

    /// Check whether the capability is currently installed
    pub fn is_available(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The capability, if installed
    pub fn current(&self) -> Option<Arc<dyn AddressAssist>> {
        self.rx.borrow().clone()
    }

    /// Wait until the capability is installed; `None` if it never will be
    pub async fn wait_available(&mut self) -> Option<Arc<dyn AddressAssist>> {
        let installed = self.rx.wait_for(|cell| cell.is_some()).await.ok()?;
        (*installed).clone()
    }
}

/// A resolved address
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub address: String,
    pub coordinate: Coordinate,
}

/// Resolves addresses through address assist first, then the geocoder
#[derive(Clone)]
pub struct Locator {
    geocoder: Arc<dyn GeocodingClient>,
    assist: AssistSlot,
}

impl Locator {
    /// Create a locator over a geocoder and an assist slot
    pub fn new(geocoder: Arc<dyn GeocodingClient>, assist: AssistSlot) -> Self {
        Self { geocoder, assist }
    }

    /// Resolve an address
    pub async fn locate(&self, query: &str) -> LookupResult<Located> {
        if let Some(assist) = self.assist.current() {
            if let Some(place) = assist.suggest(query).await {
                return Ok(Located {
                    address: place.formatted_address.unwrap_or_else(|| query.to_string()),
                    coordinate: place.location,
                });
            }
            tracing::debug!("Address assist had no suggestion; falling back to geocoder");
        }

        let coordinate = self.geocoder.geocode(query).await?;
        Ok(Located {
            address: query.to_string(),
            coordinate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_server;
    use axum::extract::Query;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingGeocoder {
        calls: AtomicUsize,
        answer: LookupResult<Coordinate>,
    }

    #[async_trait]
    impl GeocodingClient for CountingGeocoder {
        async fn geocode(&self, _query: &str) -> LookupResult<Coordinate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    struct FixedAssist(Option<PlaceSuggestion>);

    #[async_trait]
    impl AddressAssist for FixedAssist {
        async fn suggest(&self, _query: &str) -> Option<PlaceSuggestion> {
            self.0.clone()
        }
    }

    fn geocoder(answer: LookupResult<Coordinate>) -> Arc<CountingGeocoder> {
        Arc::new(CountingGeocoder {
            calls: AtomicUsize::new(0),
            answer,
        })
    }

    #[test]
    fn test_parse_string_candidates() {
        let candidates: Vec<GeocodeCandidate> = serde_json::from_value(json!([
            { "lat": "40.0", "lon": "-89.0", "display_name": "Somewhere, IL" },
            { "lat": "41.0", "lon": "-88.0" }
        ]))
        .unwrap();

        assert_eq!(first_match(&candidates).unwrap(), Coordinate::new(-89.0, 40.0));
    }

    #[test]
    fn test_parse_numeric_candidates() {
        let candidates: Vec<GeocodeCandidate> =
            serde_json::from_value(json!([{ "lat": 40.5, "lon": -89.5 }])).unwrap();
        assert_eq!(first_match(&candidates).unwrap(), Coordinate::new(-89.5, 40.5));
    }

    #[test]
    fn test_empty_candidates_is_not_found() {
        assert_eq!(first_match(&[]), Err(LookupError::NotFound));
    }

    #[test]
    fn test_garbage_coordinate_is_invalid() {
        let candidates: Vec<GeocodeCandidate> =
            serde_json::from_value(json!([{ "lat": "north", "lon": "-89.0" }])).unwrap();
        assert!(matches!(
            first_match(&candidates),
            Err(LookupError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_locator_without_assist_uses_geocoder() {
        let geo = geocoder(Ok(Coordinate::new(-89.0, 40.0)));
        let locator = Locator::new(geo.clone(), AssistSlot::unavailable());

        let located = locator.locate("1 Main St").await.unwrap();
        assert_eq!(located.address, "1 Main St");
        assert_eq!(located.coordinate, Coordinate::new(-89.0, 40.0));
        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_locator_prefers_installed_assist() {
        let geo = geocoder(Ok(Coordinate::new(0.0, 0.0)));
        let (installer, slot) = AssistSlot::pending();
        let locator = Locator::new(geo.clone(), slot);

        installer.install(Arc::new(FixedAssist(Some(PlaceSuggestion {
            formatted_address: Some("1 Main St, Springfield, IL".into()),
            location: Coordinate::new(-89.6, 39.8),
        }))));

        let located = locator.locate("1 main").await.unwrap();
        assert_eq!(located.address, "1 Main St, Springfield, IL");
        assert_eq!(located.coordinate, Coordinate::new(-89.6, 39.8));
        assert_eq!(geo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_locator_falls_back_when_assist_has_nothing() {
        let geo = geocoder(Err(LookupError::NotFound));
        let (installer, slot) = AssistSlot::pending();
        installer.install(Arc::new(FixedAssist(None)));
        let locator = Locator::new(geo.clone(), slot);

        assert_eq!(locator.locate("nowhere").await, Err(LookupError::NotFound));
        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_wait_available() {
        let (installer, mut slot) = AssistSlot::pending();
        assert!(!slot.is_available());

        let waiter = tokio::spawn(async move { slot.wait_available().await.is_some() });
        installer.install(Arc::new(FixedAssist(None)));
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_slot_never_installed() {
        let mut slot = AssistSlot::unavailable();
        assert!(slot.wait_available().await.is_none());
    }

    fn http_geocoder(endpoint: String) -> HttpGeocoder {
        let config = GeocodeConfig {
            endpoint,
            ..GeocodeConfig::default()
        };
        HttpGeocoder::new(config, Duration::from_secs(5)).unwrap()
    }

    fn header_value<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_http_geocoder_request_shape() {
        let seen: Arc<Mutex<Option<(HashMap<String, String>, HeaderMap)>>> = Arc::default();
        let record = seen.clone();
        let app = Router::new().route(
            "/search",
            get(
                move |Query(params): Query<HashMap<String, String>>, headers: HeaderMap| {
                    let record = record.clone();
                    async move {
                        *record.lock().unwrap() = Some((params, headers));
                        Json(json!([
                            { "lat": "40.0", "lon": "-89.0", "display_name": "1 Main St" },
                            { "lat": "41.0", "lon": "-88.0" }
                        ]))
                    }
                },
            ),
        );
        let base = test_server::spawn(app).await;

        let coordinate = http_geocoder(format!("{base}/search"))
            .geocode("1 Main St")
            .await
            .unwrap();
        assert_eq!(coordinate, Coordinate::new(-89.0, 40.0));

        let (params, headers) = seen.lock().unwrap().take().unwrap();
        assert_eq!(params["format"], "json");
        assert_eq!(params["q"], "1 Main St");
        assert_eq!(params["limit"], "1");
        assert_eq!(params["countrycodes"], "us");
        assert_eq!(params["addressdetails"], "0");
        assert_eq!(header_value(&headers, header::ACCEPT_LANGUAGE), Some("en"));
        assert_eq!(header_value(&headers, header::USER_AGENT), Some("lawn-estimator/1.0"));
    }

    #[tokio::test]
    async fn test_http_geocoder_empty_result_is_not_found() {
        let app = Router::new().route("/search", get(|| async { Json(json!([])) }));
        let base = test_server::spawn(app).await;

        let result = http_geocoder(format!("{base}/search")).geocode("nowhere").await;
        assert_eq!(result, Err(LookupError::NotFound));
    }

    #[tokio::test]
    async fn test_http_geocoder_error_status_is_transport_failure() {
        let app = Router::new().route(
            "/search",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = test_server::spawn(app).await;

        let result = http_geocoder(format!("{base}/search")).geocode("1 Main St").await;
        assert!(matches!(result, Err(LookupError::Transport(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_http_geocoder_garbled_payload_is_invalid() {
        let app = Router::new().route("/search", get(|| async { "<html>busy</html>" }));
        let base = test_server::spawn(app).await;

        let result = http_geocoder(format!("{base}/search")).geocode("1 Main St").await;
        assert!(matches!(result, Err(LookupError::InvalidResponse(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_http_geocoder_unreachable_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = http_geocoder(format!("http://{addr}/search"))
            .geocode("1 Main St")
            .await;
        assert!(matches!(result, Err(LookupError::Transport(_))), "{result:?}");
    }
}
