use crate::error::SourceError;
use crate::fetcher::{html_to_text, PageFetcher};
use crate::sources::{FetchRequest, SourceAdapter};
use crate::types::RawOpportunity;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use quick_xml::de::from_str;
use serde::Deserialize;

const DESCRIPTION_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RSS 2.0 feed of listings. `{location}` in the feed URL is replaced with the search text.
pub struct RssFeedAdapter {
    feed_url: String,
    fetcher: PageFetcher,
    result_cap: usize,
}

impl RssFeedAdapter {
    pub fn new(feed_url: impl Into<String>, fetcher: PageFetcher, result_cap: usize) -> Self {
        Self {
            feed_url: feed_url.into(),
            fetcher,
            result_cap,
        }
    }

    fn parse_items(&self, xml: &str) -> Result<Vec<RawOpportunity>, SourceError> {
        let rss: Rss = from_str(xml).map_err(|e| SourceError::Parse(format!("rss: {}", e)))?;
        let records = rss
            .channel
            .item
            .into_iter()
            .filter_map(|it| {
                let title = it.title.map(|t| html_to_text(&t)).filter(|t| !t.is_empty())?;
                Some(RawOpportunity {
                    source: self.name().to_string(),
                    title: Some(title),
                    description: it
                        .description
                        .map(|d| truncate(&html_to_text(&d), DESCRIPTION_LIMIT))
                        .filter(|d| !d.is_empty()),
                    posted: it.pub_date.map(|d| d.trim().to_string()),
                    link: it.link.map(|l| l.trim().to_string()),
                    ..Default::default()
                })
            })
            .take(self.result_cap)
            .collect();
        Ok(records)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

#[async_trait]
impl SourceAdapter for RssFeedAdapter {
    fn name(&self) -> &'static str {
        "RSS Feed"
    }

    async fn try_fetch(&self, request: &FetchRequest) -> Result<Vec<RawOpportunity>, SourceError> {
        let url = self.feed_url.replace(
            "{location}",
            &utf8_percent_encode(&request.location_text, NON_ALPHANUMERIC).to_string(),
        );
        let body = self.fetcher.fetch_text(&url).await?;
        self.parse_items(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Opportunities</title>
  <item>
    <title>Meal Delivery Driver</title>
    <link>https://example.org/opp/meal</link>
    <description>&lt;p&gt;Deliver meals to &lt;b&gt;homebound&lt;/b&gt; seniors&lt;/p&gt;</description>
    <pubDate>Tue, 03 Sep 2024 10:00:00 GMT</pubDate>
  </item>
  <item>
    <title></title>
    <description>no title here</description>
  </item>
  <item>
    <title>Library Reading Buddy</title>
  </item>
</channel></rss>"#;

    fn adapter(cap: usize) -> RssFeedAdapter {
        RssFeedAdapter::new(
            "https://example.org/rss",
            PageFetcher::new(Duration::from_secs(1)).unwrap(),
            cap,
        )
    }

    #[test]
    fn parses_items_and_strips_markup() {
        let records = adapter(10).parse_items(FEED).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("Meal Delivery Driver"));
        let description = records[0].description.as_deref().unwrap();
        assert!(description.contains("Deliver meals to"));
        assert!(!description.contains("<p>"));
        assert_eq!(records[0].posted.as_deref(), Some("Tue, 03 Sep 2024 10:00:00 GMT"));
        assert_eq!(records[1].title.as_deref(), Some("Library Reading Buddy"));
        assert!(records[1].description.is_none());
    }

    #[test]
    fn respects_result_cap() {
        assert_eq!(adapter(1).parse_items(FEED).unwrap().len(), 1);
    }

    #[test]
    fn malformed_feed_is_parse_error() {
        let err = adapter(10).parse_items("<html>not a feed</html>").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(250);
        let out = truncate(&long, DESCRIPTION_LIMIT);
        assert_eq!(out.chars().count(), DESCRIPTION_LIMIT + 3);
        assert!(out.ends_with("..."));
    }
}
