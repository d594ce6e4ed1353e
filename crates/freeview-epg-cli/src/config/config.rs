//! `AppConfig` struct and TOML loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use freeview_epg_core::HttpClient;
use freeview_epg_core::context::{DEFAULT_DAYS, DEFAULT_TIMEZONE};
use freeview_epg_core::http::{
    DEFAULT_BACKOFF, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT,
};
use freeview_epg_core::pipeline::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};

/// User agent sent upstream unless configured otherwise.
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Guide generation settings.
    #[serde(default)]
    pub guide: GuideConfig,
    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Guide generation settings.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuideConfig {
    /// Channel list (JSON).
    pub channels: PathBuf,
    /// XMLTV output file.
    pub output: PathBuf,
    /// Days of schedule to fetch, starting today.
    pub days: u32,
    /// IANA timezone used for day windows and output offsets.
    pub timezone: String,
    /// Channels fetched at once.
    pub concurrency: usize,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            channels: PathBuf::from("channels.json"),
            output: PathBuf::from("epg.xml"),
            days: DEFAULT_DAYS,
            timezone: String::from(DEFAULT_TIMEZONE.name()),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl GuideConfig {
    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {e}", self.timezone))
    }
}

/// HTTP transport settings.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub backoff_millis: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: String::from(DEFAULT_USER_AGENT),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_millis: u64::try_from(DEFAULT_BACKOFF.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl HttpConfig {
    /// Builds the HTTP client described by these settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn build_client(&self) -> Result<HttpClient> {
        HttpClient::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .backoff(Duration::from_millis(self.backoff_millis))
            .build()
            .context("failed to build HTTP client")
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Checks value ranges and returns the parsed timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if `days` or `concurrency` is zero, the timezone is
    /// unknown, or the user agent is blank.
    pub fn validate(&self) -> Result<Tz> {
        if self.guide.days == 0 {
            bail!("days must be at least 1");
        }
        if self.guide.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.http.user_agent.trim().is_empty() {
            bail!("http.user_agent must not be empty");
        }
        self.guide.tz()
    }
}
