//! User account model and role.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Authorization role of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Regular account.
    #[default]
    User,
    /// Administrator.
    Admin,
    /// Trusted account with extended bot access.
    Trusted,
}

impl UserRole {
    /// All variants.
    pub const ALL: [Self; 3] = [Self::User, Self::Admin, Self::Trusted];

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::Trusted => "TRUSTED",
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|r| r.as_str()).collect();
                AppError::Config(format!(
                    "invalid role name '{s}', available roles: {}",
                    names.join(", ")
                ))
            })
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Row identifier.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Password hash; never serialized to API clients.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    /// Authorization role.
    pub role: UserRole,
    /// Linked Telegram chat id, unique across users.
    pub telegram_chat_id: Option<String>,
    /// Telegram username captured at link time.
    pub telegram_username: Option<String>,
}

impl User {
    /// Whether a Telegram chat is linked.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.telegram_chat_id.is_some()
    }
}
