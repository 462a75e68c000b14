//! Bot configuration
//!
//! Defines all configurable parameters for the bot including the eurocore
//! connection, job polling cadence, notification delivery and logging.

use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Verbosity of the bot's own log output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parses a level name case-insensitively, falling back to `Info`
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("DEBUG") => LogLevel::Debug,
            Some("WARN") => LogLevel::Warn,
            Some("ERROR") => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Eurocore base URL (e.g., "https://api.europeia.dev")
    pub eurocore_url: String,

    /// Chat webhook job views are delivered to; logged only when unset
    pub webhook_url: Option<String>,

    /// How often tracked jobs are polled
    pub poll_interval: Duration,

    /// Upper bound on a single eurocore or notification call
    pub request_timeout: Duration,

    /// Status lookups the poller keeps in flight at once
    pub max_concurrent_fetches: usize,

    /// Address the command surface listens on
    pub bind_addr: String,

    pub log_level: LogLevel,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(eurocore_url: impl Into<String>) -> Self {
        Self {
            eurocore_url: normalize_url(eurocore_url.into()),
            webhook_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_level: LogLevel::Info,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - EUROCORE_URL (required)
    /// - NOTIFY_WEBHOOK_URL (optional)
    /// - POLL_INTERVAL (optional, seconds, default: 10)
    /// - REQUEST_TIMEOUT (optional, seconds, default: 10)
    /// - MAX_CONCURRENT_FETCHES (optional, default: 8)
    /// - BIND_ADDR (optional, default: 127.0.0.1:8080)
    /// - LOG_LEVEL (optional, DEBUG/INFO/WARN/ERROR, default: INFO)
    pub fn from_env() -> anyhow::Result<Self> {
        let eurocore_url = std::env::var("EUROCORE_URL")
            .map_err(|_| anyhow::anyhow!("EUROCORE_URL environment variable not set"))?;

        let webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let poll_interval = seconds_var("POLL_INTERVAL").unwrap_or(DEFAULT_POLL_INTERVAL);
        let request_timeout = seconds_var("REQUEST_TIMEOUT").unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let max_concurrent_fetches = std::env::var("MAX_CONCURRENT_FETCHES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT_FETCHES);

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let log_level = LogLevel::parse(std::env::var("LOG_LEVEL").ok().as_deref());

        Ok(Self {
            eurocore_url: normalize_url(eurocore_url),
            webhook_url,
            poll_interval,
            request_timeout,
            max_concurrent_fetches,
            bind_addr,
            log_level,
        })
    }

    /// Sets the notification webhook
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Default tracing filter when `RUST_LOG` is not set
    pub fn log_filter(&self) -> String {
        let level = self.log_level.as_str();
        format!("r4n_bot={level},r4n_client={level},tower_http=debug")
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.eurocore_url.is_empty() {
            anyhow::bail!("eurocore_url cannot be empty");
        }

        if !is_http_url(&self.eurocore_url) {
            anyhow::bail!("eurocore_url must start with http:// or https://");
        }

        if let Some(webhook_url) = &self.webhook_url {
            if !is_http_url(webhook_url) {
                anyhow::bail!("webhook_url must start with http:// or https://");
            }
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.request_timeout.as_secs() == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be greater than 0");
        }

        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}

fn seconds_var(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn normalize_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
