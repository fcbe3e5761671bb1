/*
newsbrief - main.rs
This binary loads configuration, resolves the completion-service API key once
and starts the Rocket HTTP server.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsbrief::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "newsbrief", about = "newsbrief fetch-and-summarize backend")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    // The only place the environment is consulted for the key.
    let api_key = config.llm.resolve_api_key();
    if api_key.is_none() {
        warn!(env = config.llm.api_key_env(), "completion API key not set");
    }

    let state = AppState::new(config, api_key)?;

    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(state).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
