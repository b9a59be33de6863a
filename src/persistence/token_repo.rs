//! Link token cache backed by `SQLite`.
//!
//! Tokens are keyed by the SHA-256 digest of the raw secret and carry an
//! absolute expiry. Reads never return expired rows; the retention task
//! removes them physically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::link::{hash_token, LinkToken};
use crate::Result;

use super::db::Database;
use super::encode_ts;

/// Repository for one-time link tokens.
#[derive(Clone)]
pub struct TokenRepo {
    db: Arc<Database>,
}

impl TokenRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a freshly generated token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, token: &LinkToken) -> Result<()> {
        sqlx::query("INSERT INTO link_token (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(token.hash())
            .bind(token.user_id)
            .bind(encode_ts(token.expires_at))
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Look up the user a live token maps to without consuming it.
    ///
    /// Test helper: the link handshake only ever consumes tokens through
    /// [`TokenRepo::take`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn peek(&self, token: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM link_token WHERE token_hash = ?1 AND expires_at > ?2",
        )
        .bind(hash_token(token))
        .bind(encode_ts(now))
        .fetch_optional(self.db.as_ref())
        .await?;
        Ok(user_id)
    }

    /// Atomically delete a live token and return the user it mapped to.
    ///
    /// Check and delete are one statement, so of several concurrent
    /// callers presenting the same token at most one receives `Some`.
    /// Runs on the caller's connection; a rolled-back transaction restores
    /// the token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the statement fails.
    pub async fn take(
        conn: &mut SqliteConnection,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "DELETE FROM link_token WHERE token_hash = ?1 AND expires_at > ?2 RETURNING user_id",
        )
        .bind(hash_token(token))
        .bind(encode_ts(now))
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user_id)
    }

    /// Remove every token that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM link_token WHERE expires_at <= ?1")
            .bind(encode_ts(now))
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
