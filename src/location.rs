//! Location resolution: external geocoder, process-lifetime memo, static city table.
//!
//! `resolve` never fails. Successful geocoder lookups are memoized for the life of
//! the process; failures are not, so a later identical request retries the geocoder.

use crate::error::GeocodeError;
use crate::types::Coordinates;
use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Known cities used when the geocoder is unavailable. Matched by substring.
const KNOWN_LOCATIONS: &[(&str, f64, f64)] = &[
    ("new york", 40.7128, -74.0060),
    ("los angeles", 34.0522, -118.2437),
    ("chicago", 41.8781, -87.6298),
    ("houston", 29.7604, -95.3698),
    ("phoenix", 33.4484, -112.0740),
    ("philadelphia", 39.9526, -75.1652),
    ("san antonio", 29.4241, -98.4936),
    ("san diego", 32.7157, -117.1611),
    ("dallas", 32.7767, -96.7970),
    ("san jose", 37.3382, -121.8863),
    ("10001", 40.7484, -73.9857),
    ("90001", 33.9725, -118.2491),
];

const DEFAULT_LOCATION: (f64, f64, &str) = (40.7128, -74.0060, "New York, NY");

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Top match for a free-form query.
    async fn geocode(&self, query: &str) -> Result<Coordinates, GeocodeError>;
}

/// Nominatim (OpenStreetMap) search client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("VolunteerMatch/1.0")
            .build()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coordinates, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(e.to_string()))?;
        let top = results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))?;

        let lat: f64 = top
            .lat
            .parse()
            .map_err(|_| GeocodeError::Parse(format!("invalid latitude '{}'", top.lat)))?;
        let lng: f64 = top
            .lon
            .parse()
            .map_err(|_| GeocodeError::Parse(format!("invalid longitude '{}'", top.lon)))?;

        Ok(Coordinates {
            lat,
            lng,
            display_name: top.display_name,
        })
    }
}

/// How a location was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Geocoded,
    StaticTable,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub precision: Precision,
}

pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    memo: Cache<String, Coordinates>,
    timeout: Duration,
}

impl std::fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationResolver")
            .field("memoized", &self.memo.entry_count())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self {
            geocoder,
            // no TTL: entries live for the whole process
            memo: Cache::builder().build(),
            timeout,
        }
    }

    /// Always returns usable coordinates.
    pub async fn resolve(&self, text: &str) -> Coordinates {
        self.resolve_detailed(text).await.coordinates
    }

    pub async fn resolve_detailed(&self, text: &str) -> ResolvedLocation {
        if let Some(coordinates) = self.geocode_memoized(text).await {
            return ResolvedLocation {
                coordinates,
                precision: Precision::Geocoded,
            };
        }
        let resolved = Self::resolve_offline(text);
        warn!(
            location = %text,
            precision = ?resolved.precision,
            "location resolution degraded"
        );
        resolved
    }

    /// Memo, geocoder, then static table. No hard-coded default.
    pub async fn lookup(&self, text: &str) -> Option<Coordinates> {
        if text.trim().is_empty() {
            return None;
        }
        match self.geocode_memoized(text).await {
            Some(c) => Some(c),
            None => static_lookup(text),
        }
    }

    /// Static table, then the default location. Never touches the network.
    pub fn resolve_offline(text: &str) -> ResolvedLocation {
        match static_lookup(text) {
            Some(coordinates) => ResolvedLocation {
                coordinates,
                precision: Precision::StaticTable,
            },
            None => ResolvedLocation {
                coordinates: Coordinates::named(
                    DEFAULT_LOCATION.0,
                    DEFAULT_LOCATION.1,
                    DEFAULT_LOCATION.2,
                ),
                precision: Precision::Default,
            },
        }
    }

    async fn geocode_memoized(&self, text: &str) -> Option<Coordinates> {
        if let Some(hit) = self.memo.get(text).await {
            debug!(location = %text, "geocode memo hit");
            return Some(hit);
        }
        match tokio::time::timeout(self.timeout, self.geocoder.geocode(text)).await {
            Ok(Ok(coordinates)) => {
                self.memo.insert(text.to_string(), coordinates.clone()).await;
                Some(coordinates)
            }
            Ok(Err(e)) => {
                debug!(location = %text, error = %e, "geocoding failed");
                None
            }
            Err(_) => {
                debug!(location = %text, "geocoding timed out");
                None
            }
        }
    }
}

fn static_lookup(text: &str) -> Option<Coordinates> {
    let normalized = text.to_lowercase();
    KNOWN_LOCATIONS
        .iter()
        .find(|(name, _, _)| normalized.contains(name))
        .map(|(_, lat, lng)| Coordinates::named(*lat, *lng, text.trim()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Geocoder double that counts calls and either answers or fails.
    pub(crate) struct StubGeocoder {
        pub answer: Option<Coordinates>,
        pub calls: AtomicUsize,
    }

    impl StubGeocoder {
        pub(crate) fn answering(c: Coordinates) -> Self {
            Self {
                answer: Some(c),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                answer: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn geocode(&self, query: &str) -> Result<Coordinates, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .clone()
                .ok_or_else(|| GeocodeError::NotFound(query.to_string()))
        }
    }

    #[tokio::test]
    async fn successful_lookups_are_memoized() {
        let geocoder = Arc::new(StubGeocoder::answering(Coordinates::named(
            47.6062, -122.3321, "Seattle, WA",
        )));
        let resolver = LocationResolver::new(geocoder.clone(), Duration::from_secs(1));

        let first = resolver.resolve_detailed("Seattle").await;
        let second = resolver.resolve_detailed("Seattle").await;

        assert_eq!(first.precision, Precision::Geocoded);
        assert_eq!(first, second);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let geocoder = Arc::new(StubGeocoder::failing());
        let resolver = LocationResolver::new(geocoder.clone(), Duration::from_secs(1));

        resolver.resolve("Chicago, IL").await;
        resolver.resolve("Chicago, IL").await;

        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn falls_back_to_static_table() {
        let resolver =
            LocationResolver::new(Arc::new(StubGeocoder::failing()), Duration::from_secs(1));
        let r = resolver.resolve_detailed("Downtown Chicago, IL").await;
        assert_eq!(r.precision, Precision::StaticTable);
        assert_eq!(r.coordinates.lat, 41.8781);
        assert_eq!(r.coordinates.display_name.as_deref(), Some("Downtown Chicago, IL"));
    }

    #[tokio::test]
    async fn unknown_place_uses_default() {
        let resolver =
            LocationResolver::new(Arc::new(StubGeocoder::failing()), Duration::from_secs(1));
        let r = resolver.resolve_detailed("Nowhere Special").await;
        assert_eq!(r.precision, Precision::Default);
        assert_eq!(r.coordinates.display_name.as_deref(), Some("New York, NY"));
    }

    #[tokio::test]
    async fn lookup_has_no_default() {
        let resolver =
            LocationResolver::new(Arc::new(StubGeocoder::failing()), Duration::from_secs(1));
        assert!(resolver.lookup("Nowhere Special").await.is_none());
        assert!(resolver.lookup("").await.is_none());
        assert!(resolver.lookup("Houston TX").await.is_some());
    }

    #[test]
    fn nominatim_payload_parses() {
        let json = r#"[{"lat": "41.8755616", "lon": "-87.6244212", "display_name": "Chicago, Cook County, Illinois"}]"#;
        let results: Vec<NominatimResult> = serde_json::from_str(json).unwrap();
        assert_eq!(results[0].lat, "41.8755616");
        assert!(results[0].display_name.as_deref().unwrap().starts_with("Chicago"));
    }
}
