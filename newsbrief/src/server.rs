use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, Build, Request, Rocket, Shutdown, State};

use common::Config;

use crate::digest::{self, ProcessedWikipediaEvent};
use crate::error::{ApiError, ErrorBody};
use crate::feed;
use crate::fetch::ContentFetcher;
use crate::llm::remote::RemoteLlmProvider;
use crate::llm::{LlmProvider, Summarizer};
use crate::summarize::{SummarizeRequest, SummarizeResponse, SummarizeService};

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub fetcher: ContentFetcher,
    /// `None` when no API key was supplied at startup.
    pub summarizer: Option<Summarizer>,
    pub summarize: Option<SummarizeService>,
}

impl AppState {
    /// Wire the fetcher and, when an API key is available, the remote
    /// completion provider. The key is passed in; nothing here reads the
    /// environment.
    pub fn new(config: Config, api_key: Option<String>) -> Result<Self> {
        let provider = api_key.map(|key| {
            let provider = RemoteLlmProvider::new(config.llm.api_url(), key, config.llm.model())
                .with_defaults(config.llm.timeout_seconds(), 500, config.llm.temperature());
            tracing::info!("LLM provider initialized: remote ({}) at {}", provider.model(), config.llm.api_url());
            Arc::new(provider) as Arc<dyn LlmProvider>
        });
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: Config, provider: Option<Arc<dyn LlmProvider>>) -> Result<Self> {
        let fetcher = ContentFetcher::new(&config.fetch)?;
        let summarizer = provider.map(|p| Summarizer::new(p, config.llm.max_input_chars()));
        if summarizer.is_none() {
            tracing::warn!(
                "no API key in '{}': /api/summarize will reject requests, digest summaries stay empty",
                config.llm.api_key_env()
            );
        }
        let summarize = summarizer
            .clone()
            .map(|s| SummarizeService::new(fetcher.clone(), s, config.summarize.request_timeout()));

        Ok(Self {
            started_at: Utc::now(),
            config: Arc::new(config),
            fetcher,
            summarizer,
            summarize,
        })
    }
}

#[get("/")]
async fn index(state: &State<AppState>) -> String {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    format!("newsbrief backend is running (up {}s)", uptime)
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Summarize an article and/or a discussion thread.
///
/// 200 when at least one summary was produced, 502 when every requested
/// source failed. In-flight work is dropped on server shutdown only; a client
/// that disconnects early does not cancel it.
#[post("/api/summarize", data = "<body>")]
async fn summarize(
    state: &State<AppState>,
    body: Json<SummarizeRequest>,
    shutdown: Shutdown,
) -> Result<(Status, Json<SummarizeResponse>), ApiError> {
    let service = state.summarize.as_ref().ok_or_else(|| {
        ApiError::Configuration(format!(
            "no API key for the completion service; set {}",
            state.config.llm.api_key_env()
        ))
    })?;

    let outcome = service.summarize(&body, shutdown).await?;
    let status = if outcome.succeeded() {
        Status::Ok
    } else {
        Status::BadGateway
    };
    Ok((status, Json(outcome.into_response())))
}

/// Today's digest feed, split into per-topic events.
#[get("/api/wikipedia-daily-events")]
async fn daily_events(state: &State<AppState>) -> Result<Json<Vec<ProcessedWikipediaEvent>>, ApiError> {
    let url = state.config.digest.feed_url();
    let items = feed::fetch_feed(&state.fetcher, url)
        .await
        .map_err(|e| ApiError::Upstream {
            context: "Failed to fetch daily events",
            detail: e.to_string(),
        })?;

    let events = digest::build_digest(&items, state.summarizer.as_ref()).await;
    tracing::info!(url, events = events.len(), "digest: served");
    Ok(Json(events))
}

/// JSON body for every error Rocket raises itself (bad JSON, unknown route...).
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let message = match status.code {
        400 | 422 => "Malformed request body",
        404 => "Not found",
        _ => "Internal server error",
    };
    (
        status,
        Json(ErrorBody {
            message: message.to_string(),
            error: format!("{} {}: {}", req.method(), req.uri(), status),
        }),
    )
}

/// Build Rocket with managed state and routes, binding to `[server]` from the config.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", state.config.server.bind().to_string()))
        .merge(("port", state.config.server.port()));

    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![index, health, summarize, daily_events])
        .register("/", catchers![default_catcher])
}

pub async fn launch_rocket(state: AppState) -> Result<()> {
    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
