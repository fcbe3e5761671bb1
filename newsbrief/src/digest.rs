//! Daily-digest splitting: one feed entry of the Wikipedia current-events
//! feed holds many topics separated by blank lines; each becomes one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::extract::{extract_links, strip_tags, ExtractedLink};
use crate::feed::FeedItem;
use crate::llm::{Summarizer, SummaryTask};

/// Stored in place of a summary when the completion call for a block fails.
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedWikipediaEvent {
    pub id: String,
    pub date: Option<DateTime<Utc>>,
    pub topic_title: String,
    /// `None` when no summarizer is configured.
    pub summary: Option<String>,
    pub original_text: String,
    pub source_links: Vec<ExtractedLink>,
}

/// One blank-line-delimited paragraph of plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestBlock {
    pub title: String,
    pub text: String,
}

/// Split plain text into paragraphs separated by blank (whitespace-only)
/// lines, in order. Lines are trimmed; the first line is the block title.
pub fn split_blocks(text: &str) -> Vec<DigestBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(make_block(&current));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(make_block(&current));
    }

    blocks
}

fn make_block(lines: &[&str]) -> DigestBlock {
    DigestBlock {
        title: lines[0].to_string(),
        text: lines.join("\n"),
    }
}

/// Turn feed items into per-topic events, summarizing blocks one at a time.
///
/// Links are attributed coarsely: every link found anywhere in an entry is
/// attached to every block of that entry.
pub async fn build_digest(items: &[FeedItem], summarizer: Option<&Summarizer>) -> Vec<ProcessedWikipediaEvent> {
    let mut events = Vec::new();

    for item in items {
        let html = item.description.as_deref().unwrap_or_default();
        let blocks = split_blocks(&strip_tags(html));
        let links = extract_links(html);
        info!(entry = %item.id, blocks = blocks.len(), links = links.len(), "digest: entry split");

        for (index, block) in blocks.into_iter().enumerate() {
            let summary = match summarizer {
                Some(summarizer) => match summarizer.summarize(SummaryTask::DigestBlock, &block.text).await {
                    Ok(summary) => Some(summary),
                    Err(e) => {
                        warn!(entry = %item.id, block = index, "digest: block summary failed: {}", e);
                        Some(SUMMARY_UNAVAILABLE.to_string())
                    }
                },
                None => None,
            };

            events.push(ProcessedWikipediaEvent {
                id: format!("{}_event_{}", item.id, index),
                date: item.published,
                topic_title: block.title,
                summary,
                original_text: block.text,
                source_links: links.clone(),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_counts_paragraphs_in_order() {
        let text = "\n\nArmed conflicts\nA ceasefire was agreed.\n\n   \nPolitics\nAn election was held.\n\nSports\n";
        let blocks = split_blocks(text);

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].title, "Armed conflicts");
        assert_eq!(blocks[0].text, "Armed conflicts\nA ceasefire was agreed.");
        assert_eq!(blocks[1].title, "Politics");
        assert_eq!(blocks[2].text, "Sports");
    }

    #[test]
    fn split_of_blank_text_is_empty() {
        assert!(split_blocks("").is_empty());
        assert!(split_blocks(" \n\t\n").is_empty());
    }

    #[test]
    fn split_without_blank_lines_is_one_block() {
        let blocks = split_blocks("one\ntwo\nthree");
        assert_eq!(blocks, vec![DigestBlock { title: "one".into(), text: "one\ntwo\nthree".into() }]);
    }

    #[tokio::test]
    async fn unconfigured_summarizer_leaves_summary_null() {
        let item = FeedItem {
            id: "day-1".into(),
            title: "Day".into(),
            links: Vec::new(),
            description: Some(
                "<p>Science</p>\n<p>A probe <a href=\"https://src.example.com/probe\">landed</a>.</p>\n\n<p>Health</p>"
                    .into(),
            ),
            published: None,
            comments_url: None,
        };

        let events = build_digest(&[item], None).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "day-1_event_0");
        assert_eq!(events[0].topic_title, "Science");
        assert!(events[0].summary.is_none());
        assert_eq!(events[1].id, "day-1_event_1");
        assert_eq!(events[1].topic_title, "Health");
        // Coarse attribution: the entry's link lands on every block.
        assert_eq!(events[1].source_links, events[0].source_links);
        assert_eq!(events[0].source_links[0].url, "https://src.example.com/probe");
    }

    #[test]
    fn event_serializes_null_summary() {
        let event = ProcessedWikipediaEvent {
            id: "x_event_0".into(),
            date: None,
            topic_title: "T".into(),
            summary: None,
            original_text: "T".into(),
            source_links: Vec::new(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert!(json["summary"].is_null());
        assert_eq!(json["topicTitle"], "T");
        assert!(json["sourceLinks"].as_array().map_or(false, |a| a.is_empty()));
    }
}
