use crate::error::SourceError;
use crate::fetcher::{clean_text, PageFetcher};
use crate::location::LocationResolver;
use crate::sources::{FetchRequest, SourceAdapter};
use crate::types::{CategoryId, Coordinates, RawOpportunity};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Concurrent record lookups per source.
const GEOCODE_CONCURRENCY: usize = 5;

/// Where a provider's listing page lives and how to read its cards.
///
/// `url_template` may contain `{location}` and `{keyword}`; both are percent-encoded.
#[derive(Debug, Clone)]
pub struct ListingProfile {
    pub name: &'static str,
    pub url_template: String,
    pub card: &'static str,
    pub title: &'static str,
    pub organization: Option<&'static str>,
    pub description: Option<&'static str>,
    pub location: Option<&'static str>,
    pub schedule: Option<&'static str>,
    pub posted: Option<&'static str>,
    pub link: Option<&'static str>,
    pub default_organization: Option<&'static str>,
    pub result_cap: usize,
}

impl ListingProfile {
    pub fn volunteer_match() -> Self {
        Self {
            name: "VolunteerMatch",
            url_template: "https://www.volunteermatch.org/search/index.jsp?l={location}&k={keyword}&urgentNeed=false&distance=20&numberOfOpps=20".to_string(),
            card: ".searchresult",
            title: ".title a",
            organization: Some(".org"),
            description: Some(".description"),
            location: Some(".location"),
            schedule: None,
            posted: Some(".date"),
            link: Some(".title a"),
            default_organization: None,
            result_cap: 10,
        }
    }

    pub fn idealist() -> Self {
        Self {
            name: "Idealist",
            url_template: "https://www.idealist.org/en/volunteer-opportunities?q={location}".to_string(),
            card: r#"[data-testid="search-result-card"]"#,
            title: "h3",
            organization: Some(r#"[data-testid="org-name"]"#),
            description: Some(r#"[data-testid="description"]"#),
            location: Some(r#"[data-testid="location"]"#),
            schedule: None,
            posted: None,
            link: Some("a[href]"),
            default_organization: Some("Community Organization"),
            result_cap: 10,
        }
    }

    pub fn just_serve() -> Self {
        Self {
            name: "JustServe",
            url_template: "https://www.justserve.org/projects?location={location}".to_string(),
            card: ".project-card",
            title: ".project-title, h3",
            organization: Some(".organization-name"),
            description: Some(".project-description, .description"),
            location: Some(".location"),
            schedule: Some(".date"),
            posted: None,
            link: Some("a[href]"),
            default_organization: None,
            result_cap: 15,
        }
    }

    pub fn volunteer_gov() -> Self {
        Self {
            name: "Volunteer.gov",
            url_template: "https://www.volunteer.gov/s/?search={location}".to_string(),
            card: ".opportunity-item",
            title: ".title",
            organization: None,
            description: Some(".description"),
            location: Some(".location"),
            schedule: None,
            posted: None,
            link: Some("a[href]"),
            default_organization: Some("U.S. Government"),
            result_cap: 5,
        }
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    /// Lower the cap to `max`; never raises a provider's own cap.
    pub fn with_result_cap(mut self, max: usize) -> Self {
        self.result_cap = self.result_cap.min(max);
        self
    }

    pub fn search_url(&self, location: &str, keyword: Option<CategoryId>) -> String {
        let keyword = keyword.map(|k| k.as_str()).unwrap_or("");
        self.url_template
            .replace(
                "{location}",
                &utf8_percent_encode(location, NON_ALPHANUMERIC).to_string(),
            )
            .replace(
                "{keyword}",
                &utf8_percent_encode(keyword, NON_ALPHANUMERIC).to_string(),
            )
    }

    /// Extract up to `result_cap` titled cards from a listing page.
    pub fn parse_listing(&self, html: &str, page_url: &Url) -> Result<Vec<RawOpportunity>, SourceError> {
        let card_selector = selector(self.card)?;
        let title_selector = selector(self.title)?;
        let organization = self.organization.map(selector).transpose()?;
        let description = self.description.map(selector).transpose()?;
        let location = self.location.map(selector).transpose()?;
        let schedule = self.schedule.map(selector).transpose()?;
        let posted = self.posted.map(selector).transpose()?;
        let link = self.link.map(selector).transpose()?;

        let document = Html::parse_document(html);
        let mut out = Vec::new();
        for card in document.select(&card_selector) {
            if out.len() >= self.result_cap {
                break;
            }
            let Some(title) = first_text(&card, Some(&title_selector)) else {
                continue;
            };
            let href = link
                .as_ref()
                .and_then(|s| card.select(s).find_map(|e| e.value().attr("href")))
                .and_then(|href| page_url.join(href).ok())
                .map(|u| u.to_string());

            out.push(RawOpportunity {
                source: self.name.to_string(),
                title: Some(title),
                organization: first_text(&card, organization.as_ref())
                    .or_else(|| self.default_organization.map(str::to_string)),
                description: first_text(&card, description.as_ref()),
                address: first_text(&card, location.as_ref()),
                posted: first_text(&card, posted.as_ref()),
                link: href,
                schedule: first_text(&card, schedule.as_ref()),
                coordinates: None,
            });
        }
        debug!(source = self.name, count = out.len(), "parsed listing");
        Ok(out)
    }
}

fn selector(css: &'static str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector '{}': {:?}", css, e)))
}

fn first_text(card: &ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let selector = selector?;
    card.select(selector)
        .map(|e| clean_text(&e.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// HTML listing scraper configured by a `ListingProfile`.
pub struct ListingAdapter {
    profile: ListingProfile,
    fetcher: PageFetcher,
    resolver: Option<Arc<LocationResolver>>,
}

impl ListingAdapter {
    /// With a resolver, each kept record's location text is geocoded.
    pub fn new(
        profile: ListingProfile,
        fetcher: PageFetcher,
        resolver: Option<Arc<LocationResolver>>,
    ) -> Self {
        Self {
            profile,
            fetcher,
            resolver,
        }
    }
}

#[async_trait]
impl SourceAdapter for ListingAdapter {
    fn name(&self) -> &'static str {
        self.profile.name
    }

    async fn try_fetch(&self, request: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError> {
        let started = Instant::now();
        let url = self
            .profile
            .search_url(&request.location_text, request.category_hint);
        let page_url = Url::parse(&url).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        let body = self.fetcher.fetch_text(&url).await?;
        let mut records = self.profile.parse_listing(&body, &page_url)?;

        if let Some(resolver) = &self.resolver {
            // half of the remaining budget
            let remaining = request.budget.saturating_sub(started.elapsed());
            let deadline = Instant::now() + remaining / 2;
            geocode_records(self.profile.name, resolver, &mut records, deadline).await;
        }
        Ok(records)
    }
}

/// Resolve record addresses concurrently until `deadline`. Lookups still
/// pending at the deadline leave the record without coordinates.
async fn geocode_records(
    source: &str,
    resolver: &LocationResolver,
    records: &mut [RawOpportunity],
    deadline: Instant,
) {
    let addresses: Vec<Option<String>> = records.iter().map(|r| r.address.clone()).collect();
    let lookups = addresses.into_iter().map(move |address| async move {
        let address = address?;
        tokio::time::timeout_at(deadline, resolver.lookup(&address))
            .await
            .ok()
            .flatten()
    });
    let found: Vec<Option<Coordinates>> = stream::iter(lookups)
        .buffered(GEOCODE_CONCURRENCY)
        .collect()
        .await;

    let mut located = 0;
    for (record, coordinates) in records.iter_mut().zip(found) {
        located += usize::from(coordinates.is_some());
        record.coordinates = coordinates;
    }
    if located < records.len() && Instant::now() >= deadline {
        warn!(source, located, total = records.len(), "record geocoding cut short");
    } else {
        debug!(source, located, total = records.len(), "records geocoded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM_PAGE: &str = r#"
        <html><body>
          <div class="searchresult">
            <div class="title"><a href="/opp/1">Food Bank Helper</a></div>
            <div class="org">Chicago Food Depository</div>
            <div class="description">Sort   and pack
               donations</div>
            <div class="location">Chicago, IL</div>
          </div>
          <div class="searchresult">
            <div class="title"><a href="/opp/2"></a></div>
            <div class="description">card without a title</div>
          </div>
          <div class="searchresult">
            <div class="title"><a href="https://elsewhere.org/x">Park Cleanup</a></div>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_cards_and_skips_untitled() {
        let profile = ListingProfile::volunteer_match();
        let page = Url::parse("https://www.volunteermatch.org/search/index.jsp").unwrap();
        let records = profile.parse_listing(VM_PAGE, &page).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.title.as_deref(), Some("Food Bank Helper"));
        assert_eq!(first.organization.as_deref(), Some("Chicago Food Depository"));
        assert_eq!(first.description.as_deref(), Some("Sort and pack donations"));
        assert_eq!(first.address.as_deref(), Some("Chicago, IL"));
        assert_eq!(first.link.as_deref(), Some("https://www.volunteermatch.org/opp/1"));
        assert_eq!(first.source, "VolunteerMatch");

        assert_eq!(records[1].link.as_deref(), Some("https://elsewhere.org/x"));
        assert!(records[1].organization.is_none());
    }

    #[test]
    fn result_cap_stops_collection() {
        let profile = ListingProfile::volunteer_match().with_result_cap(1);
        let page = Url::parse("https://www.volunteermatch.org/").unwrap();
        let records = profile.parse_listing(VM_PAGE, &page).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn cap_is_never_raised() {
        assert_eq!(ListingProfile::volunteer_gov().with_result_cap(50).result_cap, 5);
    }

    #[test]
    fn default_organization_fills_gaps() {
        let html = r#"<div class="opportunity-item"><span class="title">Trail Crew</span></div>"#;
        let page = Url::parse("https://www.volunteer.gov/s/").unwrap();
        let records = ListingProfile::volunteer_gov().parse_listing(html, &page).unwrap();
        assert_eq!(records[0].organization.as_deref(), Some("U.S. Government"));
    }

    #[test]
    fn search_url_encodes_location_and_keyword() {
        let url = ListingProfile::volunteer_match().search_url("San José, CA", Some(CategoryId::Food));
        assert!(url.contains("l=San%20Jos%C3%A9%2C%20CA"));
        assert!(url.contains("k=food"));
    }

    #[test]
    fn grouped_selectors_fall_back() {
        let html = r#"<div class="project-card"><h3>Coat Drive</h3><p class="description">Collect coats</p><span class="date">Dec 5</span></div>"#;
        let page = Url::parse("https://www.justserve.org/projects").unwrap();
        let records = ListingProfile::just_serve().parse_listing(html, &page).unwrap();
        assert_eq!(records[0].title.as_deref(), Some("Coat Drive"));
        assert_eq!(records[0].description.as_deref(), Some("Collect coats"));
        assert_eq!(records[0].schedule.as_deref(), Some("Dec 5"));
    }
}
