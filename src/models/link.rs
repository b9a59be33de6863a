//! One-time account linking token.

use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Freshly issued link token, returned once to the requesting user.
///
/// Only the SHA-256 digest of `token` is persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkToken {
    /// Opaque secret shown to the user or embedded in a deep link.
    pub token: String,
    /// Account the token binds to.
    pub user_id: i64,
    /// Instant after which the token no longer resolves.
    pub expires_at: DateTime<Utc>,
}

impl LinkToken {
    /// Generate a token from two v4 UUIDs (244 bits of OS randomness).
    #[must_use]
    pub fn generate(user_id: i64, expires_at: DateTime<Utc>) -> Self {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self {
            token,
            user_id,
            expires_at,
        }
    }

    /// Storage key for this token.
    #[must_use]
    pub fn hash(&self) -> String {
        hash_token(&self.token)
    }
}

impl Debug for LinkToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkToken")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Hex-encoded SHA-256 digest of a raw token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.trim().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
