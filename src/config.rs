//! Configuration module for the feed poller.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::feed::DateErrorPolicy;
use crate::{PollerError, Result};

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "RSS_POLLER_DATABASE_URL";

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (e.g. `sqlite://data/rss-poller.db`).
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

fn default_db_url() -> String {
    "sqlite://data/rss-poller.db".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_db_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Console-only logging when unset.
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<String> {
    Some("logs/rss-poller.log".to_string())
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Scheduler and worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Number of workers, which is also the batch size per tick.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Deadline for a single fetch-and-ingest job, in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    /// What to do with the rest of a feed when one item has a bad date.
    #[serde(default)]
    pub date_error_policy: DateErrorPolicy,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_concurrency() -> usize {
    5
}

fn default_job_timeout() -> u64 {
    20
}

impl PollerConfig {
    /// Tick interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-job deadline as a [`Duration`].
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            concurrency: default_concurrency(),
            job_timeout_secs: default_job_timeout(),
            date_error_policy: DateErrorPolicy::default(),
        }
    }
}

/// HTTP fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed body size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    concat!("rss-poller/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// A feed registered at startup if it does not exist yet.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeedFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Scheduler and worker pool configuration.
    #[serde(default)]
    pub poller: PollerConfig,
    /// HTTP fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Feeds to register at startup.
    #[serde(default)]
    pub feeds: Vec<SeedFeed>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PollerError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PollerError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `RSS_POLLER_DATABASE_URL`: Override the database URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(PollerError::Config("database.url must not be empty".into()));
        }
        if self.poller.concurrency == 0 {
            return Err(PollerError::Config(
                "poller.concurrency must be at least 1".into(),
            ));
        }
        if self.poller.poll_interval_secs == 0 {
            return Err(PollerError::Config(
                "poller.poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.poller.job_timeout_secs == 0 {
            return Err(PollerError::Config(
                "poller.job_timeout_secs must be at least 1".into(),
            ));
        }
        for feed in &self.feeds {
            let parsed = url::Url::parse(&feed.url).map_err(|e| {
                PollerError::Config(format!("invalid URL for feed {:?}: {e}", feed.name))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PollerError::Config(format!(
                    "unsupported URL scheme for feed {:?}: {}",
                    feed.name,
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}
