use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::info;

use crate::error::FeedError;
use crate::fetch::ContentFetcher;

/// Link relations that point at a discussion thread rather than the article.
const COMMENT_RELS: [&str; 2] = ["replies", "comments"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLink {
    pub url: String,
    pub rel: Option<String>,
}

/// One entry of a parsed feed, as the reader client sees it.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub links: Vec<FeedLink>,
    /// Entry HTML: the full content when the feed carries it, else the summary.
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub comments_url: Option<String>,
}

impl FeedItem {
    /// The article link: the first `alternate` or unlabelled link.
    pub fn article_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .map(|l| l.url.as_str())
    }
}

/// Parse RSS/Atom/JSON feed bytes into items, in feed order.
///
/// Ids come from the feed; a missing or repeated id falls back to the
/// positional `item_{index}` so ids stay unique within one parse.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>, FeedError> {
    let feed = parser::parse(bytes).map_err(|e| FeedError::Parse(e.to_string()))?;
    let mut seen = HashSet::new();

    let items = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let id = if entry.id.trim().is_empty() || seen.contains(&entry.id) {
                format!("item_{}", index)
            } else {
                entry.id.clone()
            };
            seen.insert(id.clone());

            let links: Vec<FeedLink> = entry
                .links
                .iter()
                .map(|l| FeedLink {
                    url: l.href.clone(),
                    rel: l.rel.clone(),
                })
                .collect();

            let comments_url = links
                .iter()
                .find(|l| l.rel.as_deref().map_or(false, |r| COMMENT_RELS.contains(&r)))
                .map(|l| l.url.clone());

            let description = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));

            FeedItem {
                id,
                title: entry
                    .title
                    .map(|t| t.content.trim().to_string())
                    .unwrap_or_default(),
                links,
                description,
                published: entry.published.or(entry.updated),
                comments_url,
            }
        })
        .collect();

    Ok(items)
}

/// Fetch a feed with the shared fetcher and parse it. No retry.
pub async fn fetch_feed(fetcher: &ContentFetcher, url: &str) -> Result<Vec<FeedItem>, FeedError> {
    let page = fetcher.fetch(url).await?;
    let items = parse_feed(&page.bytes)?;
    info!(url, items = items.len(), "feed: parsed");
    Ok(items)
}
