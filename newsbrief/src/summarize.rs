//! Fetch → extract → summarize orchestration for one summarize request.
//!
//! The article source and the comment source run concurrently and fail
//! independently: each yields its own `Result`, and the two are only merged
//! into one response at the very end.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{ApiError, SourceError};
use crate::extract::extract_main_text;
use crate::feed::FeedItem;
use crate::fetch::ContentFetcher;
use crate::llm::{Summarizer, SummaryTask};

/// Body of `POST /api/summarize`. Blank strings count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub text: Option<String>,
    pub url: Option<String>,
    pub item_url: Option<String>,
}

/// Where the article content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleSource<'a> {
    Text(&'a str),
    Url(&'a str),
}

fn usable(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SummarizeRequest {
    /// The request a reader client sends for a feed item: the article link
    /// as `url`, the discussion thread as `itemUrl`.
    pub fn for_item(item: &FeedItem) -> Self {
        Self {
            text: None,
            url: item.article_url().map(str::to_string),
            item_url: item.comments_url.clone(),
        }
    }

    /// Literal text wins over the article URL.
    pub fn article_source(&self) -> Option<ArticleSource<'_>> {
        if let Some(text) = usable(&self.text) {
            return Some(ArticleSource::Text(text));
        }
        usable(&self.url).map(ArticleSource::Url)
    }

    pub fn comments_url(&self) -> Option<&str> {
        usable(&self.item_url)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.article_source().is_none() && self.comments_url().is_none() {
            return Err(ApiError::Validation(
                "provide at least one of text, url or itemUrl".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body returned by `POST /api/summarize`.
///
/// `error` is only set when no summary at all could be produced; the
/// per-source error fields report a failed source next to a successful one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-source results; `None` means the source was not requested.
#[derive(Debug)]
pub struct SummarizeOutcome {
    pub article: Option<Result<String, SourceError>>,
    pub comments: Option<Result<String, SourceError>>,
}

impl SummarizeOutcome {
    /// At least one source produced a summary.
    pub fn succeeded(&self) -> bool {
        matches!(self.article, Some(Ok(_))) || matches!(self.comments, Some(Ok(_)))
    }

    pub fn into_response(self) -> SummarizeResponse {
        let mut response = SummarizeResponse::default();
        let mut failures = Vec::new();

        match self.article {
            Some(Ok(summary)) => response.article_summary = Some(summary),
            Some(Err(e)) => {
                failures.push(format!("article: {}", e));
                response.article_error = Some(e.to_string());
            }
            None => {}
        }
        match self.comments {
            Some(Ok(summary)) => response.comment_summary = Some(summary),
            Some(Err(e)) => {
                failures.push(format!("comments: {}", e));
                response.comment_error = Some(e.to_string());
            }
            None => {}
        }

        if response.article_summary.is_none() && response.comment_summary.is_none() {
            response.error = Some(if failures.is_empty() {
                "no content was summarized".to_string()
            } else {
                failures.join("; ")
            });
        }
        response
    }
}

async fn within<F>(deadline: Instant, work: F) -> Result<String, SourceError>
where
    F: Future<Output = Result<String, SourceError>>,
{
    tokio::time::timeout_at(deadline, work)
        .await
        .unwrap_or(Err(SourceError::TimedOut))
}

/// Runs the fetch-and-summarize pipeline for the sources of one request.
#[derive(Clone)]
pub struct SummarizeService {
    fetcher: ContentFetcher,
    summarizer: Summarizer,
    request_timeout: Duration,
}

impl SummarizeService {
    pub fn new(fetcher: ContentFetcher, summarizer: Summarizer, request_timeout: Duration) -> Self {
        Self {
            fetcher,
            summarizer,
            request_timeout,
        }
    }

    /// Summarize every source the request names.
    ///
    /// Both sources share one deadline but time out independently, so a hung
    /// comment page does not discard a finished article summary. When `cancel`
    /// resolves first, the in-flight pipelines are dropped (aborting their
    /// outbound calls) and every requested source reports `Cancelled`.
    ///
    /// `cancel` is whatever the caller can observe: the HTTP route passes
    /// Rocket's `Shutdown`, the CLI passes Ctrl-C. Rocket does not surface a
    /// client disconnect to a running handler, so a dropped HTTP client does
    /// not stop this work; the deadline still bounds it.
    pub async fn summarize<C>(&self, request: &SummarizeRequest, cancel: C) -> Result<SummarizeOutcome, ApiError>
    where
        C: Future<Output = ()>,
    {
        request.validate()?;

        let article = request.article_source();
        let comments = request.comments_url();
        let article_url = match article {
            Some(ArticleSource::Url(url)) => Some(url),
            _ => None,
        };
        info!(
            literal_text = matches!(article, Some(ArticleSource::Text(_))),
            url = ?article_url,
            item_url = ?comments,
            "summarize: request accepted"
        );

        let deadline = Instant::now() + self.request_timeout;

        let article_work = async {
            match article {
                Some(source) => Some(within(deadline, self.summarize_article(source)).await),
                None => None,
            }
        };
        let comments_work = async {
            match comments {
                Some(url) => Some(within(deadline, self.summarize_page(SummaryTask::Comments, url)).await),
                None => None,
            }
        };

        tokio::select! {
            (article, comments) = async { tokio::join!(article_work, comments_work) } => {
                let outcome = SummarizeOutcome { article, comments };
                if !outcome.succeeded() {
                    warn!("summarize: no source produced a summary");
                }
                Ok(outcome)
            }
            _ = cancel => {
                warn!("summarize: request cancelled, dropping in-flight work");
                Ok(SummarizeOutcome {
                    article: article.map(|_| Err(SourceError::Cancelled)),
                    comments: comments.map(|_| Err(SourceError::Cancelled)),
                })
            }
        }
    }

    async fn summarize_article(&self, source: ArticleSource<'_>) -> Result<String, SourceError> {
        match source {
            ArticleSource::Text(text) => Ok(self.summarizer.summarize(SummaryTask::Article, text).await?),
            ArticleSource::Url(url) => self.summarize_page(SummaryTask::Article, url).await,
        }
    }

    async fn summarize_page(&self, task: SummaryTask, url: &str) -> Result<String, SourceError> {
        let page = self.fetcher.fetch(url).await?;
        if !page.is_textual() {
            return Err(SourceError::UnsupportedContent {
                url: url.to_string(),
                content_type: page.content_type.unwrap_or_default(),
            });
        }

        let text = extract_main_text(&page.body, &page.url).ok_or_else(|| SourceError::NoContent {
            url: url.to_string(),
        })?;

        Ok(self.summarizer.summarize(task, &text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, SummarizationError};
    use crate::feed::FeedLink;
    use crate::llm::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
    use common::FetchConfig;
    use std::sync::Arc;

    fn request(text: Option<&str>, url: Option<&str>, item_url: Option<&str>) -> SummarizeRequest {
        SummarizeRequest {
            text: text.map(str::to_string),
            url: url.map(str::to_string),
            item_url: item_url.map(str::to_string),
        }
    }

    #[test]
    fn empty_request_is_invalid() {
        assert!(request(None, None, None).validate().is_err());
        assert!(request(Some("  "), Some(""), Some("\t")).validate().is_err());
        assert!(request(None, None, Some("https://news.example.com/item?id=1")).validate().is_ok());
    }

    #[test]
    fn literal_text_wins_over_url() {
        let req = request(Some("Body text"), Some("https://a.example/x"), None);
        assert_eq!(req.article_source(), Some(ArticleSource::Text("Body text")));

        let req = request(None, Some(" https://a.example/x "), None);
        assert_eq!(req.article_source(), Some(ArticleSource::Url("https://a.example/x")));
    }

    #[test]
    fn request_for_feed_item() {
        let item = FeedItem {
            id: "1".into(),
            title: "Story".into(),
            links: vec![
                FeedLink { url: "https://a.example/story".into(), rel: Some("alternate".into()) },
                FeedLink { url: "https://a.example/story#comments".into(), rel: Some("replies".into()) },
            ],
            description: None,
            published: None,
            comments_url: Some("https://a.example/story#comments".into()),
        };

        let req = SummarizeRequest::for_item(&item);
        assert_eq!(req.url.as_deref(), Some("https://a.example/story"));
        assert_eq!(req.item_url.as_deref(), Some("https://a.example/story#comments"));
        assert!(req.text.is_none());
    }

    #[test]
    fn single_failed_source_sets_error() {
        let outcome = SummarizeOutcome {
            article: Some(Err(SourceError::Fetch(FetchError::Timeout {
                url: "https://a.example".into(),
            }))),
            comments: None,
        };
        assert!(!outcome.succeeded());

        let response = outcome.into_response();
        assert!(response.article_summary.is_none());
        assert!(response.error.as_deref().unwrap_or_default().contains("timed out"));
    }

    #[test]
    fn partial_success_has_no_overall_error() {
        let outcome = SummarizeOutcome {
            article: Some(Ok("Article summary".into())),
            comments: Some(Err(SourceError::Summarization(SummarizationError::NoChoices))),
        };
        assert!(outcome.succeeded());

        let response = outcome.into_response();
        assert_eq!(response.article_summary.as_deref(), Some("Article summary"));
        assert!(response.comment_summary.is_none());
        assert!(response.error.is_none());
        assert!(response.comment_error.is_some());
    }

    #[test]
    fn response_serializes_camel_case_and_skips_absent_fields() {
        let response = SummarizeResponse {
            comment_summary: Some("Thread summary".into()),
            ..SummarizeResponse::default()
        };
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json, serde_json::json!({ "commentSummary": "Thread summary" }));
    }

    #[test]
    fn request_deserializes_item_url() {
        let req: SummarizeRequest =
            serde_json::from_str(r#"{"itemUrl": "https://a.example/item"}"#).expect("deserialize");
        assert_eq!(req.comments_url(), Some("https://a.example/item"));
        assert!(req.article_source().is_none());
    }

    struct SlowProvider {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl LlmProvider for SlowProvider {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, SummarizationError> {
            tokio::time::sleep(self.delay).await;
            Ok(LlmResponse {
                content: "late summary".into(),
                usage: UsageMetadata::default(),
                model: "slow".into(),
            })
        }
    }

    fn slow_service(delay: Duration, request_timeout: Duration) -> SummarizeService {
        let fetcher = ContentFetcher::new(&FetchConfig::default()).expect("fetcher");
        let summarizer = Summarizer::new(Arc::new(SlowProvider { delay }), 1000);
        SummarizeService::new(fetcher, summarizer, request_timeout)
    }

    #[tokio::test]
    async fn cancellation_marks_requested_sources() {
        let service = slow_service(Duration::from_secs(30), Duration::from_secs(60));
        let outcome = service
            .summarize(&request(Some("some text"), None, None), std::future::ready(()))
            .await
            .expect("valid request");

        assert!(matches!(outcome.article, Some(Err(SourceError::Cancelled))));
        assert!(outcome.comments.is_none());
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn deadline_expiry_times_out_source() {
        let service = slow_service(Duration::from_secs(30), Duration::from_millis(50));
        let outcome = service
            .summarize(&request(Some("some text"), None, None), std::future::pending())
            .await
            .expect("valid request");

        assert!(matches!(outcome.article, Some(Err(SourceError::TimedOut))));
        let response = outcome.into_response();
        assert!(response.error.unwrap_or_default().contains("timed out"));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_work() {
        let service = slow_service(Duration::from_secs(30), Duration::from_secs(60));
        let err = service
            .summarize(&request(None, Some("   "), None), std::future::pending())
            .await
            .err()
            .expect("validation error");
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
