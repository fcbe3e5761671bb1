/*!
common/src/lib.rs

Shared configuration types for newsbrief.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default file with an optional override
- Default values for every tunable, so an empty config is valid
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 5 * 1024 * 1024;
/// Browser-like identification; several news sites reject unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Mobile Safari/537.36";

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_INPUT_CHARS: usize = 12_000;

pub const DEFAULT_SUMMARIZE_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_DIGEST_FEED_URL: &str = "https://www.to-rss.xyz/wikipedia/current_events/";

/// HTTP listener configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

impl ServerConfig {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Outbound page / feed fetching
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    pub max_response_bytes: Option<u64>,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn max_response_bytes(&self) -> u64 {
        self.max_response_bytes.unwrap_or(DEFAULT_MAX_RESPONSE_BYTES)
    }
}

/// Remote completion service (OpenAI-compatible chat endpoint)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
    /// Character ceiling applied to content before submission.
    pub max_input_chars: Option<usize>,
}

impl LlmConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_LLM_API_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_LLM_API_KEY_ENV)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_LLM_TEMPERATURE)
    }

    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars.unwrap_or(DEFAULT_MAX_INPUT_CHARS)
    }

    /// Read the API key from the configured environment variable.
    ///
    /// Only meant to be called once at startup; the value is then handed to the
    /// provider explicitly. Empty values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Summarize endpoint tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummarizeConfig {
    /// Shared deadline for all content sources of one request.
    pub request_timeout_seconds: Option<u64>,
}

impl SummarizeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_SUMMARIZE_TIMEOUT_SECS),
        )
    }
}

/// Daily digest feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    pub feed_url: Option<String>,
}

impl DigestConfig {
    pub fn feed_url(&self) -> &str {
        self.feed_url.as_deref().unwrap_or(DEFAULT_DIGEST_FEED_URL)
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (path, label) in [(default_path, "default"), (override_path, "override")] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would only fail later, deep inside a request.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(self.llm.api_url())
            .with_context(|| format!("llm.api_url is not a valid URL: {}", self.llm.api_url()))?;
        url::Url::parse(self.digest.feed_url())
            .with_context(|| format!("digest.feed_url is not a valid URL: {}", self.digest.feed_url()))?;
        if self.llm.max_input_chars() == 0 {
            anyhow::bail!("llm.max_input_chars must be greater than zero");
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.server.port(), DEFAULT_PORT);
        assert_eq!(cfg.fetch.timeout(), Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS));
        assert_eq!(cfg.llm.model(), DEFAULT_LLM_MODEL);
        assert_eq!(cfg.llm.max_input_chars(), DEFAULT_MAX_INPUT_CHARS);
        assert_eq!(cfg.digest.feed_url(), DEFAULT_DIGEST_FEED_URL);
        assert!(cfg.validate().is_ok());
    }

    #[tokio::test]
    async fn override_wins_key_by_key() {
        let mut default_file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            default_file,
            r#"
            [server]
            port = 8000
            bind = "127.0.0.1"

            [llm]
            model = "base-model"
            max_input_chars = 5000
            "#
        )
        .expect("write default");

        let mut override_file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            override_file,
            r#"
            [server]
            port = 9000

            [llm]
            model = "override-model"
            "#
        )
        .expect("write override");

        let cfg = Config::load_with_defaults(Some(default_file.path()), Some(override_file.path()))
            .await
            .expect("load merged config");

        assert_eq!(cfg.server.port(), 9000);
        assert_eq!(cfg.server.bind(), "127.0.0.1");
        assert_eq!(cfg.llm.model(), "override-model");
        assert_eq!(cfg.llm.max_input_chars(), 5000);
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let cfg = Config::load_with_defaults(Some(Path::new("/nonexistent/default.toml")), None)
            .await
            .expect("load with no files");
        assert_eq!(cfg.summarize.request_timeout(), Duration::from_secs(DEFAULT_SUMMARIZE_TIMEOUT_SECS));
    }

    #[test]
    fn invalid_feed_url_is_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [digest]
            feed_url = "not a url"
            "#,
        )
        .expect("parse config");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg: Config = toml::from_str(
            r#"
            [llm]
            api_key_env = "NEWSBRIEF_TEST_BLANK_KEY"
            "#,
        )
        .expect("parse config");
        std::env::set_var("NEWSBRIEF_TEST_BLANK_KEY", "   ");
        assert!(cfg.llm.resolve_api_key().is_none());
        std::env::set_var("NEWSBRIEF_TEST_BLANK_KEY", "sk-test");
        assert_eq!(cfg.llm.resolve_api_key().as_deref(), Some("sk-test"));
    }
}
