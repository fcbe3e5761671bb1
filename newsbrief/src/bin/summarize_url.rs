//! Manual smoke test: run the summarize pipeline against live pages without
//! starting the HTTP server.
//!
//!   OPENAI_API_KEY=... cargo run --bin summarize_url -- https://example.com/article \
//!       --comments https://news.ycombinator.com/item?id=1
//!
//! With `--feed`, the first item of the feed is summarized the way the reader
//! client would request it (article link plus discussion link).

use clap::Parser;
use common::Config;
use std::sync::Arc;

use newsbrief::feed;
use newsbrief::fetch::ContentFetcher;
use newsbrief::llm::remote::RemoteLlmProvider;
use newsbrief::llm::Summarizer;
use newsbrief::summarize::{SummarizeRequest, SummarizeService};

#[derive(Parser, Debug)]
#[command(name = "summarize_url", about = "Summarize an article and/or a comment thread")]
struct Args {
    /// Article URL
    url: Option<String>,

    /// Comment thread URL
    #[arg(long)]
    comments: Option<String>,

    /// Summarize the first item of this RSS/Atom feed instead
    #[arg(long, conflicts_with_all = ["url", "comments"])]
    feed: Option<String>,

    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    let api_key = config
        .llm
        .resolve_api_key()
        .ok_or_else(|| anyhow::anyhow!("Set {} to run this tool", config.llm.api_key_env()))?;

    println!("\n{}", "=".repeat(60));
    println!("Model: {} at {}", config.llm.model(), config.llm.api_url());
    println!("{}", "=".repeat(60));

    let provider = RemoteLlmProvider::new(config.llm.api_url(), api_key, config.llm.model())
        .with_defaults(config.llm.timeout_seconds(), 500, config.llm.temperature());
    let summarizer = Summarizer::new(Arc::new(provider), config.llm.max_input_chars());
    let fetcher = ContentFetcher::new(&config.fetch)?;
    let service = SummarizeService::new(fetcher.clone(), summarizer, config.summarize.request_timeout());

    let request = match &args.feed {
        Some(feed_url) => {
            let items = feed::fetch_feed(&fetcher, feed_url).await?;
            let item = items
                .first()
                .ok_or_else(|| anyhow::anyhow!("feed {} has no items", feed_url))?;
            println!("Item: {} ({})", item.title, item.id);
            SummarizeRequest::for_item(item)
        }
        None => SummarizeRequest {
            text: None,
            url: args.url,
            item_url: args.comments,
        },
    };

    let cancel = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let response = service.summarize(&request, cancel).await?.into_response();

    if let Some(summary) = &response.article_summary {
        println!("\n[Article]\n{}", summary);
    }
    if let Some(summary) = &response.comment_summary {
        println!("\n[Comments]\n{}", summary);
    }
    for (label, err) in [
        ("article", &response.article_error),
        ("comments", &response.comment_error),
    ] {
        if let Some(err) = err {
            eprintln!("\n✗ {} failed: {}", label, err);
        }
    }

    println!("\n{}", "=".repeat(60));
    Ok(())
}
