use thiserror::Error;

/// Errors that reach the caller of a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search criteria: {0}")]
    InvalidInput(String),

    #[error("too many requests, try again in {retry_after_secs} seconds")]
    RateLimitExceeded { retry_after_secs: u64 },
}

/// Failures inside a single source. Never crosses the pipeline boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("access policy disallows {url}")]
    Disallowed { url: String },

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(String),

    #[error("geocoding returned HTTP {0}")]
    Status(u16),

    #[error("geocoding parse error: {0}")]
    Parse(String),

    #[error("no geocoding result for '{0}'")]
    NotFound(String),

    #[error("geocoding timed out")]
    Timeout,
}
