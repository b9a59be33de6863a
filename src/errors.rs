//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`. Transient.
    Db(String),
    /// Job queue bookkeeping failure (bad payload, unknown job kind).
    Queue(String),
    /// Messaging provider (Telegram Bot API) failure. Transient.
    Provider(String),
    /// Link token was never issued, already consumed, or expired.
    InvalidToken(String),
    /// Chat address is already linked to a different account.
    AlreadyLinked(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Caller is not authorized to perform the requested action.
    Unauthorized(String),
    /// A secret or setting required by a feature is not configured.
    ConfigurationMissing(String),
    /// File-system or socket I/O failure.
    Io(String),
}

impl AppError {
    /// Stable short name of the error variant, used in failure reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "Config",
            Self::Db(_) => "StoreUnavailable",
            Self::Queue(_) => "Queue",
            Self::Provider(_) => "ProviderUnavailable",
            Self::InvalidToken(_) => "InvalidToken",
            Self::AlreadyLinked(_) => "AlreadyLinked",
            Self::NotFound(_) => "NotFound",
            Self::Unauthorized(_) => "Unauthorized",
            Self::ConfigurationMissing(_) => "ConfigurationMissing",
            Self::Io(_) => "Io",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Queue(msg) => write!(f, "queue: {msg}"),
            Self::Provider(msg) => write!(f, "provider: {msg}"),
            Self::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            Self::AlreadyLinked(msg) => write!(f, "already linked: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::ConfigurationMissing(msg) => write!(f, "configuration missing: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Queue(format!("invalid job payload: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
