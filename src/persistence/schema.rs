//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so it is safe to
//! re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS user (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    username            TEXT NOT NULL UNIQUE,
    password_hash       TEXT,
    role                TEXT NOT NULL DEFAULT 'USER' CHECK(role IN ('USER','ADMIN','TRUSTED')),
    telegram_chat_id    TEXT UNIQUE,
    telegram_username   TEXT
);

CREATE TABLE IF NOT EXISTS task (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                 INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
    title                   TEXT NOT NULL,
    details                 TEXT,
    status                  TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open','done','archived')),
    type                    TEXT NOT NULL DEFAULT 'inbox'
                            CHECK(type IN ('inbox','current','someday','calendar','rest','routine')),
    deadline                TEXT,
    duration                INTEGER,
    planned_start           TEXT,
    planned_end             TEXT,
    suspend_due             TEXT,
    notify_at               TEXT,
    planned_start_notified  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS link_token (
    token_hash      TEXT PRIMARY KEY NOT NULL,
    user_id         INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
    expires_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS job (
    id              TEXT PRIMARY KEY NOT NULL,
    kind            TEXT NOT NULL,
    payload         TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('queued','running','done','failed')),
    attempts        INTEGER NOT NULL DEFAULT 0,
    max_attempts    INTEGER NOT NULL,
    run_at          TEXT NOT NULL,
    locked_until    TEXT,
    last_error      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_user ON task(user_id);
CREATE INDEX IF NOT EXISTS idx_task_suspend_due ON task(suspend_due);
CREATE INDEX IF NOT EXISTS idx_task_notify_at ON task(notify_at);
CREATE INDEX IF NOT EXISTS idx_task_planned_start ON task(planned_start);
CREATE INDEX IF NOT EXISTS idx_link_token_expiry ON link_token(expires_at);
CREATE INDEX IF NOT EXISTS idx_job_ready ON job(status, run_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
