//! Source adapters: one per external provider of volunteer listings.

pub mod listing;
pub mod rss;

use crate::config::Settings;
use crate::error::SourceError;
use crate::fetcher::PageFetcher;
use crate::location::LocationResolver;
use crate::types::{CategoryId, RawOpportunity};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use listing::{ListingAdapter, ListingProfile};
pub use rss::RssFeedAdapter;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub location_text: String,
    pub category_hint: Option<CategoryId>,
    pub budget: Duration,
}

/// A retrieval component bound to one provider.
///
/// Implementors provide `try_fetch`; callers use `fetch`, which never fails and
/// turns every error into an empty contribution.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provider name reported in responses, e.g. "VolunteerMatch".
    fn name(&self) -> &'static str;

    async fn try_fetch(&self, request: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError>;

    async fn fetch(&self, request: &FetchRequest) -> Vec<RawOpportunity> {
        match self.try_fetch(request).await {
            Ok(records) => {
                info!(source = self.name(), count = records.len(), "source fetched");
                records
            }
            Err(SourceError::Disallowed { url }) => {
                info!(source = self.name(), %url, "skipped by access policy");
                Vec::new()
            }
            Err(e) => {
                warn!(source = self.name(), error = %e, "source unavailable");
                Vec::new()
            }
        }
    }
}

/// Names accepted in `ENABLED_SOURCES`.
pub const KNOWN_SOURCES: &[&str] = &["volunteermatch", "idealist", "justserve", "volunteergov", "rss"];

/// Build the adapter registry iterated at fan-out time.
pub fn build_sources(
    settings: &Settings,
    fetcher: &PageFetcher,
    resolver: &Arc<LocationResolver>,
) -> Vec<Arc<dyn SourceAdapter>> {
    let record_resolver = settings.geocode_records.then(|| resolver.clone());
    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    for name in &settings.enabled_sources {
        let profile = match name.as_str() {
            "volunteermatch" => Some(ListingProfile::volunteer_match()),
            "idealist" => Some(ListingProfile::idealist()),
            "justserve" => Some(ListingProfile::just_serve()),
            "volunteergov" => Some(ListingProfile::volunteer_gov()),
            "rss" => {
                sources.push(Arc::new(RssFeedAdapter::new(
                    settings.rss_feed_url.clone(),
                    fetcher.clone(),
                    settings.source_result_cap,
                )));
                None
            }
            other => {
                warn!(source = %other, "unknown source in ENABLED_SOURCES, ignoring");
                None
            }
        };
        if let Some(profile) = profile {
            let profile = profile.with_result_cap(settings.source_result_cap);
            sources.push(Arc::new(ListingAdapter::new(
                profile,
                fetcher.clone(),
                record_resolver.clone(),
            )));
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl SourceAdapter for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }

        async fn try_fetch(&self, _: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError> {
            Err(SourceError::Parse("unexpected markup".into()))
        }
    }

    #[test]
    fn fetch_swallows_errors() {
        let request = FetchRequest {
            location_text: "Chicago".into(),
            category_hint: None,
            budget: Duration::from_secs(1),
        };
        assert!(tokio_test::block_on(Broken.fetch(&request)).is_empty());
    }
}
