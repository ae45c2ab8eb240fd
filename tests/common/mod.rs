//! Shared test doubles for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use volunteer_finder::clock::ManualClock;
use volunteer_finder::config::Settings;
use volunteer_finder::error::{GeocodeError, SourceError};
use volunteer_finder::location::Geocoder;
use volunteer_finder::sources::{FetchRequest, SourceAdapter};
use volunteer_finder::{AppState, Coordinates, RawOpportunity};

/// Chicago as it appears in the static city table.
pub const CHICAGO: (f64, f64) = (41.8781, -87.6298);

/// Degrees of latitude per statute mile, near enough for test fixtures.
pub const DEG_PER_MILE: f64 = 1.0 / 69.0;

/// Geocoder that is always down, forcing the static table.
pub struct OfflineGeocoder;

#[async_trait]
impl Geocoder for OfflineGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Coordinates, GeocodeError> {
        Err(GeocodeError::Request("connection refused".into()))
    }
}

/// Adapter returning canned records and counting calls.
pub struct StubSource {
    pub name: &'static str,
    pub records: Vec<RawOpportunity>,
    pub calls: AtomicUsize,
}

impl StubSource {
    pub fn new(name: &'static str, records: Vec<RawOpportunity>) -> Arc<Self> {
        Arc::new(Self {
            name,
            records,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn try_fetch(&self, _: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

pub struct FailingSource;

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &'static str {
        "Failing"
    }

    async fn try_fetch(&self, _: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError> {
        Err(SourceError::Status {
            url: "https://listings.invalid/search".into(),
            status: 503,
        })
    }
}

pub struct HangingSource;

#[async_trait]
impl SourceAdapter for HangingSource {
    fn name(&self) -> &'static str {
        "Hanging"
    }

    async fn try_fetch(&self, _: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// A titled record `miles` north of Chicago.
pub fn record_north_of_chicago(source: &str, title: &str, miles: f64) -> RawOpportunity {
    RawOpportunity {
        source: source.to_string(),
        title: Some(title.to_string()),
        description: Some("Help out at the food pantry".to_string()),
        coordinates: Some(Coordinates::new(CHICAGO.0 + miles * DEG_PER_MILE, CHICAGO.1)),
        ..Default::default()
    }
}

pub fn as_source<S: SourceAdapter + 'static>(source: &Arc<S>) -> Arc<dyn SourceAdapter> {
    source.clone()
}

pub fn test_settings() -> Settings {
    Settings {
        geocode_timeout: Duration::from_millis(200),
        source_timeout: Duration::from_millis(300),
        search_deadline: Duration::from_secs(5),
        ..Settings::default()
    }
}

pub fn state_with(
    settings: Settings,
    sources: Vec<Arc<dyn SourceAdapter>>,
    clock: Arc<ManualClock>,
) -> Arc<AppState> {
    Arc::new(AppState::with_geocoder(
        settings,
        Arc::new(OfflineGeocoder),
        sources,
        clock,
    ))
}
