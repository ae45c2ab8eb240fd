//! Best-effort robots.txt check performed before any source request.

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Product token matched against `User-agent` lines. Also appended to every
/// outgoing User-Agent header.
pub const ROBOTS_AGENT: &str = "VolunteerFinder";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Rules applying to this crawler for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    rules: Vec<Rule>,
}

impl RobotsRules {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse a robots.txt body, keeping the group for `agent` or else the `*` group.
    pub fn parse(body: &str, agent: &str) -> Self {
        let agent = agent.to_lowercase();
        let mut specific: Vec<Rule> = Vec::new();
        let mut wildcard: Vec<Rule> = Vec::new();
        let mut matched_specific = false;

        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();
            match field.as_str() {
                "user-agent" => {
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(product_token(value));
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    let for_us = group_agents.iter().any(|a| *a == agent);
                    let for_all = group_agents.iter().any(|a| a == "*");
                    matched_specific |= for_us;
                    // empty Disallow means allow everything
                    if value.is_empty() {
                        continue;
                    }
                    let rule = Rule {
                        allow: field == "allow",
                        pattern: value.to_string(),
                    };
                    if for_us {
                        specific.push(rule.clone());
                    }
                    if for_all {
                        wildcard.push(rule);
                    }
                }
                _ => {}
            }
        }

        Self {
            rules: if matched_specific { specific } else { wildcard },
        }
    }

    /// Longest matching pattern wins; allow wins a length tie.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<&Rule> = None;
        for rule in &self.rules {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            best = match best {
                Some(b)
                    if b.pattern.len() > rule.pattern.len()
                        || (b.pattern.len() == rule.pattern.len() && b.allow) =>
                {
                    Some(b)
                }
                _ => Some(rule),
            };
        }
        best.map(|r| r.allow).unwrap_or(true)
    }
}

/// `Googlebot/2.1` and `googlebot` both name the token `googlebot`.
fn product_token(value: &str) -> String {
    value.split('/').next().unwrap_or("").trim().to_lowercase()
}

/// robots.txt patterns: prefix match, `*` wildcard, `$` end anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    let rest: Vec<&str> = parts.collect();
    for (i, part) in rest.iter().enumerate() {
        if part.is_empty() {
            if i == rest.len() - 1 {
                return true;
            }
            continue;
        }
        match path[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }
    !anchored || pos == path.len()
}

/// Caches parsed robots.txt per origin. Unreachable or missing files allow everything.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    client: reqwest::Client,
    rules: Cache<String, RobotsRules>,
}

impl AccessPolicy {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            rules: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(60 * 60))
                .build(),
        }
    }

    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        let rules = match self.rules.get(&origin).await {
            Some(r) => r,
            None => {
                let r = self.fetch_rules(&origin).await;
                self.rules.insert(origin.clone(), r.clone()).await;
                r
            }
        };
        let mut path = url.path().to_string();
        if let Some(q) = url.query() {
            path.push('?');
            path.push_str(q);
        }
        rules.is_allowed(&path)
    }

    async fn fetch_rules(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", origin);
        let response = match self
            .client
            .get(&robots_url)
            .header(
                "User-Agent",
                format!("{}/{}", ROBOTS_AGENT, env!("CARGO_PKG_VERSION")),
            )
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %robots_url, error = %e, "robots.txt unreachable, allowing");
                return RobotsRules::allow_all();
            }
        };
        if !response.status().is_success() {
            debug!(url = %robots_url, status = %response.status(), "no robots.txt, allowing");
            return RobotsRules::allow_all();
        }
        match response.text().await {
            Ok(body) => RobotsRules::parse(&body, ROBOTS_AGENT),
            Err(_) => RobotsRules::allow_all(),
        }
    }
}
