pub mod api;
pub mod cache;
pub mod categorize;
pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod geo;
pub mod location;
pub mod mcp;
pub mod normalize;
pub mod rate_limit;
pub mod robots;
pub mod search;
pub mod sources;
pub mod stdio_service;
pub mod types;

use crate::cache::ResultCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::fetcher::PageFetcher;
use crate::location::{Geocoder, LocationResolver, NominatimGeocoder};
use crate::rate_limit::RateLimiter;
use crate::search::AggregationPipeline;
use crate::sources::SourceAdapter;
use std::sync::Arc;

pub use types::*;

/// Shared service state, built once at startup and handed to every surface.
#[derive(Debug)]
pub struct AppState {
    pub settings: Settings,
    pub resolver: Arc<LocationResolver>,
    pub pipeline: AggregationPipeline,
    pub cache: Arc<ResultCache<SearchResponse>>,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Production wiring: Nominatim geocoder, configured source registry, wall clock.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let geocoder = NominatimGeocoder::new(&settings.nominatim_url, settings.geocode_timeout)?;
        let resolver = Arc::new(LocationResolver::new(
            Arc::new(geocoder),
            settings.geocode_timeout,
        ));
        let fetcher = PageFetcher::new(settings.source_timeout)?;
        let sources = sources::build_sources(&settings, &fetcher, &resolver);
        Ok(Self::new(settings, resolver, sources, Arc::new(SystemClock)))
    }

    /// Wire state from explicit parts. Tests inject stub sources, geocoders and clocks here.
    pub fn new(
        settings: Settings,
        resolver: Arc<LocationResolver>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pipeline = AggregationPipeline::new(
            resolver.clone(),
            sources,
            settings.source_timeout,
            settings.max_results,
        );
        let cache = Arc::new(ResultCache::new(settings.cache_ttl, clock.clone()));
        let limiter = RateLimiter::new(
            settings.rate_limit_max_requests,
            settings.rate_limit_window,
            clock,
        );
        Self {
            settings,
            resolver,
            pipeline,
            cache,
            limiter,
        }
    }

    /// Convenience for tests and embedders that only have a geocoder.
    pub fn with_geocoder(
        settings: Settings,
        geocoder: Arc<dyn Geocoder>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = Arc::new(LocationResolver::new(geocoder, settings.geocode_timeout));
        Self::new(settings, resolver, sources, clock)
    }
}
