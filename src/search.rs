use crate::categorize::Categorizer;
use crate::error::SearchError;
use crate::fallback;
use crate::location::{LocationResolver, Precision, ResolvedLocation};
use crate::normalize::{
    apply_filters, contributing_sources, dedup_by_title, normalize_records, sort_by_distance,
};
use crate::sources::{FetchRequest, SourceAdapter};
use crate::types::{Coordinates, Opportunity, RawOpportunity, SearchCriteria, SearchResponse};
use crate::AppState;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Fan-out, merge and ranking over the adapter registry.
pub struct AggregationPipeline {
    resolver: Arc<LocationResolver>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    categorizer: Categorizer,
    source_timeout: Duration,
    max_results: usize,
}

impl std::fmt::Debug for AggregationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("AggregationPipeline")
            .field("sources", &names)
            .field("source_timeout", &self.source_timeout)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl AggregationPipeline {
    pub fn new(
        resolver: Arc<LocationResolver>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        source_timeout: Duration,
        max_results: usize,
    ) -> Self {
        Self {
            resolver,
            sources,
            categorizer: Categorizer::new(),
            source_timeout,
            max_results,
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run one search. Never fails: with no live records the fallback catalog is served.
    pub async fn search(&self, criteria: &SearchCriteria) -> SearchResponse {
        let resolved = self.resolver.resolve_detailed(criteria.location_text()).await;
        let mut warnings = resolution_warnings(criteria, &resolved);
        let origin = resolved.coordinates;

        let raw = self.fan_out(criteria).await;
        let received = raw.len();
        let normalized = normalize_records(raw, &origin, &self.categorizer);
        debug!(received, usable = normalized.len(), "records normalized");

        if normalized.is_empty() {
            warn!(location = %criteria.location_text(), "no live results, serving fallback catalog");
            warnings.push("live sources returned no results; showing sample opportunities".to_string());
            let catalog = fallback::catalog(criteria.location_text(), &origin);
            return self.package(criteria, origin, catalog, true, warnings);
        }

        self.package(criteria, origin, normalized, false, warnings)
    }

    /// Fallback-only response built without touching the network. Used when the
    /// overall search deadline passes.
    pub fn degraded_response(&self, criteria: &SearchCriteria, reason: &str) -> SearchResponse {
        let resolved = LocationResolver::resolve_offline(criteria.location_text());
        let mut warnings = resolution_warnings(criteria, &resolved);
        warnings.push(reason.to_string());
        let origin = resolved.coordinates;
        let catalog = fallback::catalog(criteria.location_text(), &origin);
        self.package(criteria, origin, catalog, true, warnings)
    }

    /// Sample catalog around the resolved location, with no source fan-out.
    pub async fn sample(&self, criteria: &SearchCriteria) -> SearchResponse {
        let origin = self.resolver.resolve(criteria.location_text()).await;
        let catalog = fallback::catalog(criteria.location_text(), &origin);
        self.package(criteria, origin, catalog, true, Vec::new())
    }

    /// One task per adapter, each bounded by the per-source budget. A timeout
    /// or panic in one task contributes nothing. Output keeps registry order.
    async fn fan_out(&self, criteria: &SearchCriteria) -> Vec<RawOpportunity> {
        let request = FetchRequest {
            location_text: criteria.location_text().to_string(),
            category_hint: criteria.category_hint(),
            budget: self.source_timeout,
        };

        let tasks = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let request = request.clone();
            tokio::spawn(
                async move {
                    match tokio::time::timeout(request.budget, source.fetch(&request)).await {
                        Ok(records) => records,
                        Err(_) => {
                            warn!(source = source.name(), budget = ?request.budget, "source timed out");
                            Vec::new()
                        }
                    }
                }
                .in_current_span(),
            )
        });

        let outcomes = join_all(tasks).await;
        let mut merged = Vec::new();
        for (outcome, source) in outcomes.into_iter().zip(&self.sources) {
            match outcome {
                Ok(records) => merged.extend(records),
                Err(e) => warn!(source = source.name(), error = %e, "source task failed"),
            }
        }
        merged
    }

    fn package(
        &self,
        criteria: &SearchCriteria,
        origin: Coordinates,
        opportunities: Vec<Opportunity>,
        degraded: bool,
        warnings: Vec<String>,
    ) -> SearchResponse {
        let deduped = dedup_by_title(opportunities);
        let mut kept = apply_filters(deduped, criteria);
        sort_by_distance(&mut kept);
        kept.truncate(self.max_results);

        let location = origin
            .display_name
            .clone()
            .unwrap_or_else(|| criteria.location_text().to_string());
        SearchResponse {
            total: kept.len(),
            sources: contributing_sources(&kept),
            opportunities: kept,
            location,
            coordinates: origin,
            degraded,
            warnings,
        }
    }
}

fn resolution_warnings(criteria: &SearchCriteria, resolved: &ResolvedLocation) -> Vec<String> {
    match resolved.precision {
        Precision::Geocoded => Vec::new(),
        Precision::StaticTable => vec![format!(
            "could not geocode '{}'; using approximate city coordinates",
            criteria.location_text()
        )],
        Precision::Default => vec![format!(
            "could not locate '{}'; distances are measured from New York, NY",
            criteria.location_text()
        )],
    }
}

/// Admission, cache fast-path, then a deadline-bounded pipeline run.
pub async fn search_opportunities(
    state: &Arc<AppState>,
    client_id: &str,
    criteria: &SearchCriteria,
) -> Result<SearchResponse, SearchError> {
    state.limiter.check(client_id)?;

    let cache_key = criteria.cache_key();
    if let Some(cached) = state.cache.get(&cache_key) {
        debug!(key = %cache_key, "search cache hit");
        return Ok(cached);
    }

    let search_id = Uuid::new_v4();
    let span = info_span!("search", %search_id, location = %criteria.location_text());
    let deadline = state.settings.search_deadline;

    let response = async {
        match tokio::time::timeout(deadline, state.pipeline.search(criteria)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(?deadline, "search deadline exceeded");
                state
                    .pipeline
                    .degraded_response(criteria, "search took too long; showing sample opportunities")
            }
        }
    }
    .instrument(span)
    .await;

    info!(
        %search_id,
        total = response.total,
        degraded = response.degraded,
        sources = ?response.sources,
        "search complete"
    );

    if !response.degraded {
        state.cache.put(cache_key, response.clone());
    }
    Ok(response)
}
