use crate::error::SourceError;
use crate::robots::{AccessPolicy, ROBOTS_AGENT};
use rand::Rng;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Shared HTTP fetcher for sources: robots check, rotated User-Agent, status handling.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    policy: AccessPolicy,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SourceError::Request {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        let policy = AccessPolicy::new(client.clone());
        Ok(Self { client, policy })
    }

    /// Random browser User-Agent with our product token appended.
    fn random_user_agent(&self) -> String {
        let mut rng = rand::thread_rng();
        user_agent(USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())])
    }

    /// Fetch a page body. Returns `Disallowed` without any request when robots.txt forbids the path.
    pub async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        let parsed = Url::parse(url).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SourceError::InvalidUrl(format!(
                "{}: must use HTTP or HTTPS",
                url
            )));
        }

        if !self.policy.is_allowed(&parsed).await {
            return Err(SourceError::Disallowed {
                url: url.to_string(),
            });
        }

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(parsed)
            .header("User-Agent", self.random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| SourceError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SourceError::Request {
            url: url.to_string(),
            message: format!("failed to read response body: {}", e),
        })?;
        info!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

fn user_agent(browser: &str) -> String {
    format!("{} {}/{}", browser, ROBOTS_AGENT, env!("CARGO_PKG_VERSION"))
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    static RE_WS: OnceLock<Regex> = OnceLock::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"));
    re.replace_all(text, " ").trim().to_string()
}

/// Strip markup from an HTML fragment and clean the text.
pub fn html_to_text(fragment: &str) -> String {
    clean_text(&html2text::from_read(fragment.as_bytes(), 1000))
}
