//! User repository for `SQLite` persistence.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::models::user::{User, UserRole};
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for user records.
#[derive(Clone)]
pub struct UserRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: Option<String>,
    role: String,
    telegram_chat_id: Option<String>,
    telegram_username: Option<String>,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = self
            .role
            .parse::<UserRole>()
            .map_err(|_| AppError::Db(format!("invalid user role: {}", self.role)))?;

        Ok(User {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            role,
            telegram_chat_id: self.telegram_chat_id,
            telegram_username: self.telegram_username,
        })
    }
}

impl UserRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a user and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails (for example, a duplicate username).
    pub async fn create(
        &self,
        username: &str,
        password_hash: Option<&str>,
        role: UserRole,
    ) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO user (username, password_hash, role) VALUES (?1, ?2, ?3) RETURNING *",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(self.db.as_ref())
        .await?;

        row.into_user()
    }

    /// Retrieve a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM user WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Retrieve a user by login name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM user WHERE username = ?1")
            .bind(username)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Retrieve the user linked to a Telegram chat.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_chat_id(&self, chat_id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM user WHERE telegram_chat_id = ?1")
                .bind(chat_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Find the id of a user other than `user_id` that holds `chat_id`.
    ///
    /// Runs on the caller's connection so it can participate in a transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_other_holder(
        conn: &mut SqliteConnection,
        chat_id: &str,
        user_id: i64,
    ) -> Result<Option<i64>> {
        let holder: Option<i64> =
            sqlx::query_scalar("SELECT id FROM user WHERE telegram_chat_id = ?1 AND id != ?2")
                .bind(chat_id)
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(holder)
    }

    /// Attach a Telegram chat to a user on the caller's connection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist,
    /// `AppError::AlreadyLinked` if the chat is held by another user, or
    /// `AppError::Db` on other failures.
    pub async fn link_chat(
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: &str,
        telegram_username: Option<&str>,
    ) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE user SET telegram_chat_id = ?1, telegram_username = ?2
             WHERE id = ?3 RETURNING *",
        )
        .bind(chat_id)
        .bind(telegram_username)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.is_unique_violation() {
                    return AppError::AlreadyLinked(format!(
                        "chat {chat_id} is linked to another account"
                    ));
                }
            }
            AppError::from(err)
        })?;

        row.ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?
            .into_user()
    }

    /// Clear the Telegram linkage of a user. Succeeds when already unlinked.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not exist.
    pub async fn unlink_chat(&self, user_id: i64) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE user SET telegram_chat_id = NULL, telegram_username = NULL
             WHERE id = ?1 RETURNING *",
        )
        .bind(user_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?
            .into_user()
    }

    /// Set the role of the user with `username`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no such user exists.
    pub async fn set_role(&self, username: &str, role: UserRole) -> Result<User> {
        let row: Option<UserRow> =
            sqlx::query_as("UPDATE user SET role = ?1 WHERE username = ?2 RETURNING *")
                .bind(role.as_str())
                .bind(username)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.ok_or_else(|| AppError::NotFound(format!("user '{username}' not found")))?
            .into_user()
    }
}
