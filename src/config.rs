//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name under which secrets are looked up.
const KEYRING_SERVICE: &str = "goat-notify";

/// Upper bound for durations added to timestamps (one year).
const MAX_WINDOW_SECONDS: u64 = 366 * 24 * 3600;

/// Upper bound for `retention_days` (one hundred years).
const MAX_RETENTION_DAYS: u32 = 36_500;

/// Web API bind settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    /// Interface to bind.
    #[serde(default = "default_http_host")]
    pub host: IpAddr,
    /// TCP port; `0` lets the OS choose.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

fn default_http_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_http_port() -> u16 {
    5001
}

/// Reminder scanner timing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds between scan passes.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Look-ahead for "starting soon" notifications.
    #[serde(default = "default_upcoming_window_seconds")]
    pub upcoming_window_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            upcoming_window_seconds: default_upcoming_window_seconds(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_upcoming_window_seconds() -> u64 {
    3600
}

/// Job queue retry and polling policy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Delivery attempts before a job is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further attempt.
    #[serde(default = "default_retry_base_seconds")]
    pub retry_base_seconds: u64,
    /// Upper bound for the retry delay.
    #[serde(default = "default_retry_max_seconds")]
    pub retry_max_seconds: u64,
    /// How long a claimed job stays invisible to other workers.
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
    /// Sleep between polls when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_seconds: default_retry_base_seconds(),
            retry_max_seconds: default_retry_max_seconds(),
            lease_seconds: default_lease_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_seconds() -> u64 {
    30
}

fn default_retry_max_seconds() -> u64 {
    600
}

fn default_lease_seconds() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Telegram Bot API settings.
///
/// The bot token is loaded at runtime via OS keychain or environment
/// variables, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TelegramConfig {
    /// Bot handle (without `@`) used to build deep links.
    #[serde(default)]
    pub bot_username: Option<String>,
    /// Chat that receives job failure reports.
    #[serde(default)]
    pub admin_chat_id: Option<String>,
    /// Bot API root URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Timeout applied to every Bot API request.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
    /// Bot token (populated at runtime).
    #[serde(skip)]
    pub bot_token: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_username: None,
            admin_chat_id: None,
            api_base_url: default_api_base_url(),
            request_timeout_seconds: default_request_timeout_seconds(),
            poll_timeout_seconds: default_poll_timeout_seconds(),
            bot_token: None,
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".into()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

/// Account linking settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LinkingConfig {
    /// Lifetime of an issued link token.
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

fn default_token_ttl_seconds() -> u64 {
    600
}

fn default_retention_days() -> u32 {
    30
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    pub db_path: PathBuf,
    /// Days after which finished jobs are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Web API settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// Reminder scanner settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Job queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Telegram settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Account linking settings.
    #[serde(default)]
    pub linking: LinkingConfig,
    /// Shared secret for service-to-service routes (populated at runtime).
    #[serde(skip)]
    pub internal_token: Option<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the bot token and internal token from OS keychain with
    /// env-var fallback.
    ///
    /// Missing secrets are not an error: the dependent feature is
    /// disabled and a warning is logged.
    pub async fn load_credentials(&mut self) {
        self.telegram.bot_token =
            load_optional_credential("telegram_bot_token", "TELEGRAM_BOT_TOKEN").await;
        self.internal_token =
            load_optional_credential("internal_token", "GOAT_INTERNAL_TOKEN").await;

        if self.telegram.bot_token.is_none() {
            warn!("TELEGRAM_BOT_TOKEN is not configured; telegram delivery and bot polling disabled");
        }
        if self.internal_token.is_none() {
            warn!("GOAT_INTERNAL_TOKEN is not configured; internal routes disabled");
        }
    }

    /// Socket address for the web API.
    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Interval between scan passes.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }

    /// Link token lifetime as a chrono duration.
    #[must_use]
    pub fn token_ttl(&self) -> chrono::Duration {
        seconds_to_chrono(self.linking.token_ttl_seconds)
    }

    /// Look-ahead window for "starting soon" notices.
    #[must_use]
    pub fn upcoming_window(&self) -> chrono::Duration {
        seconds_to_chrono(self.scheduler.upcoming_window_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.interval_seconds == 0 {
            return Err(AppError::Config(
                "scheduler.interval_seconds must be greater than zero".into(),
            ));
        }
        if self.scheduler.upcoming_window_seconds == 0 {
            return Err(AppError::Config(
                "scheduler.upcoming_window_seconds must be greater than zero".into(),
            ));
        }
        if self.queue.max_attempts == 0 {
            return Err(AppError::Config(
                "queue.max_attempts must be greater than zero".into(),
            ));
        }
        if self.queue.retry_max_seconds < self.queue.retry_base_seconds {
            return Err(AppError::Config(
                "queue.retry_max_seconds must not be less than queue.retry_base_seconds".into(),
            ));
        }
        if self.linking.token_ttl_seconds == 0 {
            return Err(AppError::Config(
                "linking.token_ttl_seconds must be greater than zero".into(),
            ));
        }
        if self.linking.token_ttl_seconds > MAX_WINDOW_SECONDS
            || self.scheduler.upcoming_window_seconds > MAX_WINDOW_SECONDS
        {
            return Err(AppError::Config(format!(
                "linking.token_ttl_seconds and scheduler.upcoming_window_seconds must not exceed {MAX_WINDOW_SECONDS}"
            )));
        }
        if self.queue.lease_seconds == 0 {
            return Err(AppError::Config(
                "queue.lease_seconds must be greater than zero".into(),
            ));
        }
        if self.queue.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "queue.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(AppError::Config(format!(
                "retention_days must not exceed {MAX_RETENTION_DAYS}"
            )));
        }
        if self.telegram.api_base_url.trim().is_empty() {
            return Err(AppError::Config("telegram.api_base_url must not be empty".into()));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(AppError::Config("db_path must not be empty".into()));
        }
        Ok(())
    }
}

/// Load a single secret from OS keychain with env-var fallback.
///
/// Returns `None` when neither source yields a non-empty value.
async fn load_optional_credential(keyring_key: &str, env_key: &str) -> Option<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return Some(value),
        Ok(Ok(_)) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Ok(Err(err)) => {
            tracing::debug!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
        Err(err) => {
            warn!(key = keyring_key, %err, "keychain task panicked, trying env var");
        }
    }

    env::var(env_key).ok().filter(|value| !value.trim().is_empty())
}

fn seconds_to_chrono(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
