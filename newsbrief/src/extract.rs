//! HTML to text helpers: tag stripping, readable-article extraction and
//! anchor scanning.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, info, warn};

const EXCERPT_CHARS: usize = 200;

/// Elements whose text is never user-visible.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Tag-shaped runs left in text nodes once entities are decoded (`&lt;b&gt;`).
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Result of a successful readable extraction.
#[derive(Debug, Clone)]
pub struct ReadableContent {
    pub title: String,
    pub text: String,
    pub excerpt: String,
}

/// One anchor found in an HTML fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    pub text: String,
}

/// Remove all markup, keeping text nodes in document order.
///
/// Whitespace between elements is preserved as-is (blank lines included) and
/// `<br>` becomes a newline, so paragraph boundaries survive for callers that
/// split on blank lines. The output never contains `<`: escaped markup that
/// decodes into a tag is removed as well, and a stray `<` is dropped.
pub fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len() / 2);

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    matches!(a.value(), Node::Element(e) if HIDDEN_ELEMENTS.contains(&e.name()))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            _ => {}
        }
    }

    if out.contains('<') {
        out = RE_TAG.replace_all(&out, "").replace('<', "");
    }
    out
}

/// Anchors with an `href`, in document order. No dedup, no URL resolution.
pub fn extract_links(html: &str) -> Vec<ExtractedLink> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let fragment = Html::parse_fragment(html);

    fragment
        .select(&selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(ExtractedLink {
                url: href.trim().to_string(),
                text: collapse_whitespace(&a.text().collect::<String>()),
            })
        })
        .collect()
}

/// Reader-mode extraction of the main article block.
///
/// `None` means the heuristic found nothing usable; that is an expected
/// outcome for index pages, comment threads and the like.
pub fn extract_readable(html: &str, page_url: &str) -> Option<ReadableContent> {
    let url_obj = match url::Url::parse(page_url) {
        Ok(u) => u,
        Err(e) => {
            warn!("extract: cannot parse page URL {}: {}", page_url, e);
            return None;
        }
    };

    let mut reader = Cursor::new(html.as_bytes());
    let product = match readability::extractor::extract(&mut reader, &url_obj) {
        Ok(p) => p,
        Err(e) => {
            warn!("extract: readability failed for {}: {}", page_url, e);
            return None;
        }
    };

    // Prefer the structured rendering of the extracted HTML; readability's own
    // text flattens lists and headings.
    let text = match html2text::from_read(product.content.as_bytes(), 80) {
        Ok(rendered) if !rendered.trim().is_empty() => rendered,
        Ok(_) => product.text,
        Err(e) => {
            warn!("extract: failed to render extracted HTML as text: {}", e);
            product.text
        }
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let excerpt = meta_description(html).unwrap_or_else(|| text.chars().take(EXCERPT_CHARS).collect());
    info!("extract: readability extracted {} chars from {}", text.len(), page_url);

    Some(ReadableContent {
        title: product.title.trim().to_string(),
        text,
        excerpt,
    })
}

/// Readable extraction, falling back to plain tag stripping of the whole page.
///
/// The page title heads the readable text unless the text already opens with it.
pub fn extract_main_text(html: &str, page_url: &str) -> Option<String> {
    if let Some(readable) = extract_readable(html, page_url) {
        debug!(title = %readable.title, excerpt = %readable.excerpt, "extract: readable article from {}", page_url);
        let first_line = readable.text.lines().next().unwrap_or_default();
        if readable.title.is_empty() || first_line.contains(&readable.title) {
            return Some(readable.text);
        }
        return Some(format!("{}\n\n{}", readable.title, readable.text));
    }

    let stripped = normalize_blank_lines(&strip_tags(html));
    if stripped.is_empty() {
        None
    } else {
        info!("extract: fell back to stripped page text ({} chars) for {}", stripped.len(), page_url);
        Some(stripped)
    }
}

fn meta_description(html: &str) -> Option<String> {
    let selector =
        Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|m| m.value().attr("content"))
        .map(collapse_whitespace)
        .find(|d| !d.is_empty())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim every line and squeeze runs of blank lines into one.
fn normalize_blank_lines(s: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in s.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().map_or(false, |l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
