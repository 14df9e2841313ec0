//! Configuration loading and validation.

use crate::error::{ConfigError, Result};

/// Tickerbot configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Command prefix the bot responds to (e.g. "$").
    pub prefix: String,

    /// Discord bot token.
    pub token: String,

    /// Channel ids the bot responds in. Empty means all channels.
    pub target_channels: Vec<u64>,

    /// Optional periodic health check reporting.
    pub health_check: Option<HealthCheckConfig>,

    /// Watch polling settings.
    pub watch: WatchConfig,
}

/// External health check endpoint settings.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub url: String,
    pub method: String,
    pub bearer_token: Option<String>,
}

/// Watch polling settings.
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    /// Seconds between price checks for a watched symbol.
    pub poll_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let prefix = std::env::var("BOT_PREFIX").unwrap_or_else(|_| "$".into());
        validate_prefix(&prefix)?;

        let token = std::env::var("BOT_TOKEN")
            .map_err(|_| ConfigError::MissingKey("BOT_TOKEN".into()))?;
        if token.trim().is_empty() {
            return Err(ConfigError::MissingKey("BOT_TOKEN".into()).into());
        }

        let target_channels = std::env::var("BOT_TARGET_CHANNEL_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    ConfigError::Invalid(format!("bad channel id in BOT_TARGET_CHANNEL_IDS: {s}"))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let health_check = std::env::var("BOT_HEALTHCHECK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| HealthCheckConfig {
                url,
                method: std::env::var("BOT_HEALTHCHECK_METHOD").unwrap_or_else(|_| "GET".into()),
                bearer_token: std::env::var("BOT_HEALTHCHECK_BEARER_TOKEN").ok(),
            });

        let poll_interval_secs = match std::env::var("BOT_WATCH_INTERVAL_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!("bad BOT_WATCH_INTERVAL_SECS: {raw}"))
            })?,
            Err(_) => WatchConfig::default().poll_interval_secs,
        };

        Ok(Self {
            prefix,
            token,
            target_channels,
            health_check,
            watch: WatchConfig { poll_interval_secs },
        })
    }

    /// Whether the bot should respond in the given channel.
    pub fn is_channel_allowed(&self, channel_id: u64) -> bool {
        self.target_channels.is_empty() || self.target_channels.contains(&channel_id)
    }
}

/// The prefix marks command tokens, so it can never contain characters that
/// appear in ticker symbols or whitespace.
fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(ConfigError::Invalid("BOT_PREFIX must not be empty".into()).into());
    }

    if prefix
        .chars()
        .any(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
    {
        return Err(ConfigError::Invalid(format!(
            "BOT_PREFIX must not contain letters, digits, or whitespace: {prefix:?}"
        ))
        .into());
    }

    Ok(())
}
