//! Error taxonomy for the fetch-and-summarize pipeline.
//!
//! Lower layers return typed errors; the HTTP layer turns `ApiError` into a
//! JSON `{message, error}` body. Per-source failures (`SourceError`) never
//! become an `ApiError`: they are folded into the summarize response instead.

use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retrieving a remote page or feed failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is too large: {size} bytes (max {max})")]
    TooLarge { url: String, size: u64, max: u64 },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Retrieving or parsing an RSS/Atom feed failed.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse feed: {0}")]
    Parse(String),
}

/// The completion call errored or produced nothing usable.
#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM HTTP request failed: {0}")]
    Transport(String),
    #[error("LLM request timed out")]
    Timeout,
    #[error("failed to parse LLM response: {0}")]
    Decode(String),
    #[error("LLM response has no choices")]
    NoChoices,
    #[error("LLM returned an empty summary")]
    Empty,
}

/// Failure of one content source (article or comments) of a summarize request.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url} is not a readable page (content-type: {content_type})")]
    UnsupportedContent { url: String, content_type: String },
    #[error("no readable content found at {url}")]
    NoContent { url: String },
    #[error(transparent)]
    Summarization(#[from] SummarizationError),
    #[error("timed out before the summary was ready")]
    TimedOut,
    #[error("request was cancelled")]
    Cancelled,
}

/// JSON error body shared by handlers and catchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
}

/// Request-level failures surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing configuration: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{context}: {detail}")]
    Upstream { context: &'static str, detail: String },
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Configuration(_) => Status::InternalServerError,
            ApiError::Validation(_) => Status::BadRequest,
            ApiError::Upstream { .. } => Status::InternalServerError,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Configuration(_) => "Summarization service is not configured",
            ApiError::Validation(_) => "No content provided to summarize",
            ApiError::Upstream { context, .. } => context,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error = match self {
            ApiError::Configuration(detail) | ApiError::Validation(detail) => detail.clone(),
            ApiError::Upstream { detail, .. } => detail.clone(),
        };
        ErrorBody {
            message: self.message().to_string(),
            error,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        tracing::error!(status = self.status().code, "{}", self);
        (self.status(), Json(self.body())).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_keeps_transport_message() {
        let err: SourceError = FetchError::Transport {
            url: "https://example.com".into(),
            message: "dns error: no such host".into(),
        }
        .into();
        assert!(err.to_string().contains("no such host"));
        assert!(err.to_string().contains("https://example.com"));
    }

    #[test]
    fn api_error_statuses() {
        assert_eq!(ApiError::Validation("x".into()).status(), Status::BadRequest);
        assert_eq!(ApiError::Configuration("x".into()).status(), Status::InternalServerError);

        let body = ApiError::Upstream {
            context: "Failed to fetch daily events",
            detail: "feed returned HTTP 503".into(),
        }
        .body();
        assert_eq!(body.message, "Failed to fetch daily events");
        assert_eq!(body.error, "feed returned HTTP 503");
    }
}
