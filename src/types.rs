use crate::error::SearchError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Default search radius when the caller does not send one.
pub const DEFAULT_MAX_DISTANCE_MILES: f64 = 25.0;

/// Closed category taxonomy. Declaration order is the categorizer's tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryId {
    Food,
    Animals,
    Education,
    Environment,
    Seniors,
    Homeless,
    Health,
    Children,
    Community,
    Technology,
    General,
}

impl CategoryId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryId::Food => "food",
            CategoryId::Animals => "animals",
            CategoryId::Education => "education",
            CategoryId::Environment => "environment",
            CategoryId::Seniors => "seniors",
            CategoryId::Homeless => "homeless",
            CategoryId::Health => "health",
            CategoryId::Children => "children",
            CategoryId::Community => "community",
            CategoryId::Technology => "technology",
            CategoryId::General => "general",
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryId {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s.trim().to_lowercase().as_str() {
            "food" => CategoryId::Food,
            "animals" | "animal" => CategoryId::Animals,
            "education" => CategoryId::Education,
            "environment" => CategoryId::Environment,
            "seniors" | "senior" => CategoryId::Seniors,
            "homeless" => CategoryId::Homeless,
            "health" | "healthcare" => CategoryId::Health,
            "children" | "youth" => CategoryId::Children,
            "community" => CategoryId::Community,
            "technology" | "tech" => CategoryId::Technology,
            "general" => CategoryId::General,
            other => {
                return Err(SearchError::InvalidInput(format!(
                    "unknown category '{}'",
                    other
                )))
            }
        };
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Weekends,
    Weekdays,
    Flexible,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Weekends => "weekends",
            Availability::Weekdays => "weekdays",
            Availability::Flexible => "flexible",
        }
    }
}

/// Wire shape of a search request as sent by the web client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text location, e.g. "Chicago, IL" or a zip code
    #[serde(default)]
    pub location: String,
    /// Search radius in miles (default 25)
    #[serde(default)]
    pub max_distance: Option<f64>,
    /// Category ids to keep; empty means any category
    #[serde(default)]
    pub interests: Vec<String>,
    /// Case-insensitive text that must appear in title, description or organization
    #[serde(default)]
    pub keywords: Option<String>,
    /// Only return remote/virtual opportunities
    #[serde(default)]
    pub remote_only: bool,
    /// weekends, weekdays or flexible
    #[serde(default)]
    pub availability: Option<String>,
}

/// Validated, normalized search criteria. Fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    location_text: String,
    max_distance_miles: f64,
    categories: BTreeSet<CategoryId>,
    keywords: Option<String>,
    remote_only: bool,
    availability: Option<Availability>,
}

impl SearchCriteria {
    pub fn new(location_text: &str) -> Result<Self, SearchError> {
        let location_text = location_text.trim();
        if location_text.is_empty() {
            return Err(SearchError::InvalidInput(
                "location is required".to_string(),
            ));
        }
        Ok(Self {
            location_text: location_text.to_string(),
            max_distance_miles: DEFAULT_MAX_DISTANCE_MILES,
            categories: BTreeSet::new(),
            keywords: None,
            remote_only: false,
            availability: None,
        })
    }

    pub fn with_max_distance(mut self, miles: f64) -> Result<Self, SearchError> {
        if !miles.is_finite() || miles <= 0.0 {
            return Err(SearchError::InvalidInput(format!(
                "maxDistance must be a positive number, got {}",
                miles
            )));
        }
        self.max_distance_miles = miles;
        Ok(self)
    }

    pub fn with_categories<I: IntoIterator<Item = CategoryId>>(mut self, categories: I) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_keywords(mut self, keywords: &str) -> Self {
        let trimmed = keywords.trim();
        self.keywords = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_remote_only(mut self, remote_only: bool) -> Self {
        self.remote_only = remote_only;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = Some(availability);
        self
    }

    /// Validate a wire request. An empty location is the only hard requirement.
    pub fn from_request(request: &SearchRequest) -> Result<Self, SearchError> {
        let mut criteria = Self::new(&request.location)?;
        if let Some(miles) = request.max_distance {
            criteria = criteria.with_max_distance(miles)?;
        }
        let categories = request
            .interests
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<CategoryId>())
            .collect::<Result<Vec<_>, _>>()?;
        criteria = criteria.with_categories(categories);
        if let Some(keywords) = &request.keywords {
            criteria = criteria.with_keywords(keywords);
        }
        criteria = criteria.with_remote_only(request.remote_only);
        if let Some(raw) = request.availability.as_deref().filter(|s| !s.trim().is_empty()) {
            let availability = match raw.trim().to_lowercase().as_str() {
                "weekends" => Availability::Weekends,
                "weekdays" => Availability::Weekdays,
                "flexible" => Availability::Flexible,
                other => {
                    return Err(SearchError::InvalidInput(format!(
                        "unknown availability '{}'",
                        other
                    )))
                }
            };
            criteria = criteria.with_availability(availability);
        }
        Ok(criteria)
    }

    pub fn location_text(&self) -> &str {
        &self.location_text
    }

    pub fn max_distance_miles(&self) -> f64 {
        self.max_distance_miles
    }

    pub fn categories(&self) -> &BTreeSet<CategoryId> {
        &self.categories
    }

    pub fn keywords(&self) -> Option<&str> {
        self.keywords.as_deref()
    }

    pub fn remote_only(&self) -> bool {
        self.remote_only
    }

    pub fn availability(&self) -> Option<Availability> {
        self.availability
    }

    /// A single category is forwarded to sources that can narrow server-side.
    pub fn category_hint(&self) -> Option<CategoryId> {
        if self.categories.len() == 1 {
            self.categories.iter().next().copied()
        } else {
            None
        }
    }

    /// Deterministic cache key over every field that influences the response.
    pub fn cache_key(&self) -> String {
        format!(
            "loc={}|dist={}|cat={}|kw={}|remote={}|avail={}",
            self.location_text.to_lowercase(),
            self.max_distance_miles,
            self.categories
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(","),
            self.keywords
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_default(),
            self.remote_only,
            self.availability.map(|a| a.as_str()).unwrap_or("any"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            display_name: None,
        }
    }

    pub fn named(lat: f64, lng: f64, display_name: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            display_name: Some(display_name.into()),
        }
    }
}

/// Provider record before normalization. Nothing is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOpportunity {
    pub source: String,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub posted: Option<String>,
    pub link: Option<String>,
    pub schedule: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub organization: String,
    pub description: String,
    pub category: CategoryId,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub distance_miles: Option<f64>,
    pub posting_date: Option<NaiveDate>,
    pub remote_option: bool,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub opportunities: Vec<Opportunity>,
    pub total: usize,
    pub sources: Vec<String>,
    /// Resolved display name of the search origin
    pub location: String,
    pub coordinates: Coordinates,
    /// True when live sources produced nothing and the offline catalog was used
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}
