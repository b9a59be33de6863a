//! Telegram account linking handshake.
//!
//! A signed-in user asks for a one-time token ([`LinkService::issue`]);
//! the bot presents it back together with the chat it came from
//! ([`LinkService::resolve`]). A token moves from created to either
//! consumed or expired, never back.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::models::link::LinkToken;
use crate::models::user::User;
use crate::persistence::db::Database;
use crate::persistence::token_repo::TokenRepo;
use crate::persistence::user_repo::UserRepo;
use crate::{AppError, Result};

/// Issues and resolves link tokens.
#[derive(Clone)]
pub struct LinkService {
    db: Arc<Database>,
    tokens: TokenRepo,
    users: UserRepo,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl LinkService {
    /// Create a service whose tokens live for `ttl`.
    #[must_use]
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            tokens: TokenRepo::new(Arc::clone(&db)),
            users: UserRepo::new(Arc::clone(&db)),
            db,
            clock,
            ttl,
        }
    }

    /// Token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for an authenticated user.
    ///
    /// Earlier outstanding tokens for the same user stay valid.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist, or
    /// `AppError::Db` if the token cannot be stored.
    pub async fn issue(&self, user_id: i64) -> Result<LinkToken> {
        if self.users.get_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {user_id} not found")));
        }

        let token = LinkToken::generate(user_id, self.clock.now() + self.ttl);
        self.tokens.insert(&token).await?;
        info!(user_id, expires_at = %token.expires_at, "link token issued");
        Ok(token)
    }

    /// Consume `token` and link `chat_id` to the user it was issued for.
    ///
    /// Token removal and the user update share one transaction: if the chat
    /// belongs to a different user the transaction rolls back and the token
    /// stays usable.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidToken` if the token is unknown, consumed, or expired.
    /// - `AppError::AlreadyLinked` if `chat_id` is linked to another user.
    /// - `AppError::NotFound` if the token's user no longer exists.
    /// - `AppError::Db` on store failure.
    pub async fn resolve(
        &self,
        token: &str,
        chat_id: &str,
        telegram_username: Option<&str>,
    ) -> Result<User> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let Some(user_id) = TokenRepo::take(&mut tx, token, now).await? else {
            return Err(AppError::InvalidToken(
                "link is invalid or has expired".into(),
            ));
        };

        if let Some(holder) = UserRepo::find_other_holder(&mut tx, chat_id, user_id).await? {
            warn!(user_id, holder, chat_id, "chat already linked to another account");
            return Err(AppError::AlreadyLinked(format!(
                "chat {chat_id} is linked to another account"
            )));
        }

        let user = UserRepo::link_chat(&mut tx, user_id, chat_id, telegram_username).await?;
        tx.commit().await?;

        info!(user_id, chat_id, "telegram account linked");
        Ok(user)
    }

    /// Remove the Telegram link of a user. A no-op for unlinked accounts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist.
    pub async fn unlink(&self, user_id: i64) -> Result<User> {
        let user = self.users.unlink_chat(user_id).await?;
        info!(user_id, "telegram account unlinked");
        Ok(user)
    }

    /// User linked to `chat_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn linked_user(&self, chat_id: &str) -> Result<Option<User>> {
        self.users.get_by_chat_id(chat_id).await
    }
}
