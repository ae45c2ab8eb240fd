//! Record normalization and the merge/dedup/filter/sort steps of a search.

use crate::categorize::Categorizer;
use crate::fetcher::clean_text;
use crate::geo::distance_between;
use crate::types::{Coordinates, Opportunity, RawOpportunity, SearchCriteria};
use chrono::{DateTime, NaiveDate};
use std::cmp::Ordering;
use std::collections::HashSet;

pub const DEFAULT_ORGANIZATION: &str = "Local Organization";
pub const DEFAULT_DESCRIPTION: &str = "Volunteer opportunity in your community";
pub const DEFAULT_ADDRESS: &str = "Contact for location";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

/// Normalize raw records in arrival order. Records without a usable title are dropped.
pub fn normalize_records(
    raw: Vec<RawOpportunity>,
    origin: &Coordinates,
    categorizer: &Categorizer,
) -> Vec<Opportunity> {
    raw.into_iter()
        .filter_map(|r| {
            let title = r.title.as_deref().map(clean_text).filter(|t| !t.is_empty())?;
            Some((title, r))
        })
        .enumerate()
        .map(|(index, (title, r))| {
            let description = non_empty(r.description);
            let category = categorizer.categorize(&title, description.as_deref().unwrap_or(""));
            let remote_option = description.as_deref().map(is_remote).unwrap_or(false);
            let distance_miles = r.coordinates.as_ref().map(|c| distance_between(origin, c));
            Opportunity {
                id: format!("{}-{}", source_slug(&r.source), index + 1),
                title,
                organization: non_empty(r.organization)
                    .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_string()),
                description: description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                category,
                address: non_empty(r.address).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
                coordinates: r.coordinates,
                distance_miles,
                posting_date: r.posted.as_deref().and_then(parse_posting_date),
                remote_option,
                source: r.source,
                website: non_empty(r.link),
                schedule: non_empty(r.schedule),
            }
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

pub fn source_slug(source: &str) -> String {
    let slug: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if slug.is_empty() {
        "src".to_string()
    } else {
        slug
    }
}

pub fn is_remote(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("remote") || lower.contains("virtual")
}

/// Accepts RFC 2822 (RSS), RFC 3339 and a few common listing formats.
pub fn parse_posting_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
}

/// Case-insensitive exact title match; the first occurrence wins regardless of source.
pub fn dedup_by_title(opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    let mut seen = HashSet::new();
    opportunities
        .into_iter()
        .filter(|o| seen.insert(o.title.trim().to_lowercase()))
        .collect()
}

pub fn matches_criteria(opportunity: &Opportunity, criteria: &SearchCriteria) -> bool {
    // unknown distance stays eligible
    if let Some(d) = opportunity.distance_miles {
        if d > criteria.max_distance_miles() {
            return false;
        }
    }
    if !criteria.categories().is_empty() && !criteria.categories().contains(&opportunity.category)
    {
        return false;
    }
    if criteria.remote_only() && !opportunity.remote_option {
        return false;
    }
    if let Some(keywords) = criteria.keywords() {
        let needle = keywords.to_lowercase();
        let hit = [
            &opportunity.title,
            &opportunity.description,
            &opportunity.organization,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    true
}

pub fn apply_filters(opportunities: Vec<Opportunity>, criteria: &SearchCriteria) -> Vec<Opportunity> {
    opportunities
        .into_iter()
        .filter(|o| matches_criteria(o, criteria))
        .collect()
}

/// Stable ascending sort by distance; unknown distances go last in arrival order.
pub fn sort_by_distance(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| match (a.distance_miles, b.distance_miles) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Sources in order of first appearance.
pub fn contributing_sources(opportunities: &[Opportunity]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for o in opportunities {
        if seen.insert(o.source.as_str()) {
            sources.push(o.source.clone());
        }
    }
    sources
}
