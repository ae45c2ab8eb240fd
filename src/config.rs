use crate::sources::KNOWN_SOURCES;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_RSS_FEED_URL: &str = "https://www.volunteermatch.org/search/rss?l={location}";

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub nominatim_url: String,
    pub geocode_timeout: Duration,
    /// Budget for one adapter's fetch
    pub source_timeout: Duration,
    /// Hard deadline for a whole search, after which the fallback is served
    pub search_deadline: Duration,
    pub source_result_cap: usize,
    pub max_results: usize,
    pub cache_ttl: Duration,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    pub enabled_sources: Vec<String>,
    pub rss_feed_url: String,
    /// Geocode each scraped record's location text
    pub geocode_records: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3001,
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            geocode_timeout: Duration::from_secs(5),
            source_timeout: Duration::from_secs(20),
            search_deadline: Duration::from_secs(45),
            source_result_cap: 15,
            max_results: 20,
            cache_ttl: Duration::from_secs(3600),
            rate_limit_max_requests: 100,
            rate_limit_window: Duration::from_secs(900),
            enabled_sources: KNOWN_SOURCES.iter().map(|s| s.to_string()).collect(),
            rss_feed_url: DEFAULT_RSS_FEED_URL.to_string(),
            geocode_records: true,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or malformed values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: parse_or(&get, "PORT", defaults.port),
            nominatim_url: get("NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
            geocode_timeout: secs_or(&get, "GEOCODE_TIMEOUT_SECS", defaults.geocode_timeout),
            source_timeout: secs_or(&get, "SOURCE_TIMEOUT_SECS", defaults.source_timeout),
            search_deadline: secs_or(&get, "SEARCH_DEADLINE_SECS", defaults.search_deadline),
            source_result_cap: parse_or(&get, "SOURCE_RESULT_CAP", defaults.source_result_cap),
            max_results: parse_or(&get, "MAX_RESULTS", defaults.max_results),
            cache_ttl: secs_or(&get, "CACHE_TTL_SECS", defaults.cache_ttl),
            rate_limit_max_requests: parse_or(
                &get,
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_window: secs_or(&get, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window),
            enabled_sources: get("ENABLED_SOURCES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.enabled_sources),
            rss_feed_url: get("RSS_FEED_URL").unwrap_or(defaults.rss_feed_url),
            geocode_records: parse_or(&get, "GEOCODE_RECORDS", defaults.geocode_records),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring malformed setting");
            default
        }),
        None => default,
    }
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Duration
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, key, default.as_secs());
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.port, 3001);
        assert_eq!(s.max_results, 20);
        assert_eq!(s.cache_ttl, Duration::from_secs(3600));
        assert_eq!(s.rate_limit_max_requests, 100);
        assert_eq!(s.rate_limit_window, Duration::from_secs(900));
        assert_eq!(s.enabled_sources.len(), KNOWN_SOURCES.len());
        assert!(s.geocode_records);
    }

    #[test]
    fn overrides_are_applied() {
        let s = settings(&[
            ("PORT", "8080"),
            ("SOURCE_TIMEOUT_SECS", "3"),
            ("ENABLED_SOURCES", " RSS, idealist ,"),
            ("GEOCODE_RECORDS", "false"),
        ]);
        assert_eq!(s.port, 8080);
        assert_eq!(s.source_timeout, Duration::from_secs(3));
        assert_eq!(s.enabled_sources, vec!["rss", "idealist"]);
        assert!(!s.geocode_records);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let s = settings(&[("PORT", "eighty"), ("MAX_RESULTS", "")]);
        assert_eq!(s.port, 3001);
        assert_eq!(s.max_results, 20);
    }
}
