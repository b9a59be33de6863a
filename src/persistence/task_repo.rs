//! Task repository for `SQLite` persistence.
//!
//! Besides plain lookups, this module holds the sweeps the reminder
//! scanner runs inside its per-pass transaction. Those take a
//! `&mut SqliteConnection` so the caller decides the transaction scope.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::task::{NewTask, Task, TaskStatus, TaskType};
use crate::Result;

use super::db::Database;
use super::{decode_opt_ts, encode_opt_ts, encode_ts};

/// Repository wrapper around `SQLite` for task records.
#[derive(Clone)]
pub struct TaskRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    user_id: i64,
    title: String,
    details: Option<String>,
    status: String,
    #[sqlx(rename = "type")]
    task_type: String,
    deadline: Option<String>,
    duration: Option<i64>,
    planned_start: Option<String>,
    planned_end: Option<String>,
    suspend_due: Option<String>,
    notify_at: Option<String>,
    planned_start_notified: i64,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            details: self.details,
            status: TaskStatus::parse(&self.status)?,
            task_type: TaskType::parse(&self.task_type)?,
            deadline: decode_opt_ts("deadline", self.deadline.as_deref())?,
            duration: self.duration,
            planned_start: decode_opt_ts("planned_start", self.planned_start.as_deref())?,
            planned_end: decode_opt_ts("planned_end", self.planned_end.as_deref())?,
            suspend_due: decode_opt_ts("suspend_due", self.suspend_due.as_deref())?,
            notify_at: decode_opt_ts("notify_at", self.notify_at.as_deref())?,
            planned_start_notified: self.planned_start_notified != 0,
        })
    }
}

/// A task whose trigger field crossed the scan threshold, joined with the
/// owner's linked chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredTask {
    /// Task identifier.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Task title.
    pub title: String,
    /// Owner's linked Telegram chat, if any.
    pub chat_id: Option<String>,
    /// Planned start (set for "starting soon" candidates).
    pub planned_start: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct TriggeredRow {
    id: i64,
    user_id: i64,
    title: String,
    chat_id: Option<String>,
    planned_start: Option<String>,
}

impl TriggeredRow {
    fn into_triggered(self) -> Result<TriggeredTask> {
        Ok(TriggeredTask {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            chat_id: self.chat_id,
            planned_start: decode_opt_ts("planned_start", self.planned_start.as_deref())?,
        })
    }
}

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new open task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        let row: TaskRow = sqlx::query_as(
            "INSERT INTO task (user_id, title, details, status, type, deadline, duration,
             planned_start, planned_end, suspend_due, notify_at, planned_start_notified)
             VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
             RETURNING *",
        )
        .bind(task.user_id)
        .bind(&task.title)
        .bind(&task.details)
        .bind(task.task_type.as_str())
        .bind(encode_opt_ts(task.deadline))
        .bind(task.duration)
        .bind(encode_opt_ts(task.planned_start))
        .bind(encode_opt_ts(task.planned_end))
        .bind(encode_opt_ts(task.suspend_due))
        .bind(encode_opt_ts(task.notify_at))
        .fetch_one(self.db.as_ref())
        .await?;

        row.into_task()
    }

    /// Retrieve a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM task WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(TaskRow::into_task).transpose()
    }

    /// List a user's open tasks, optionally restricted to one type.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_open_for_user(
        &self,
        user_id: i64,
        task_type: Option<TaskType>,
    ) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM task
             WHERE user_id = ?1 AND status = 'open' AND (?2 IS NULL OR type = ?2)
             ORDER BY id",
        )
        .bind(user_id)
        .bind(task_type.map(TaskType::as_str))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Move the planned window of a task.
    ///
    /// A changed `planned_start` re-arms the "starting soon" notification;
    /// writing the same value keeps the notified flag.
    ///
    /// Fixture helper: task editing lives in the web application, which
    /// writes these columns directly. Only tests call this.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_planned_window(
        &self,
        id: i64,
        planned_start: Option<DateTime<Utc>>,
        planned_end: Option<DateTime<Utc>>,
    ) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            "UPDATE task SET
                planned_start_notified = CASE WHEN planned_start IS ?1
                                              THEN planned_start_notified ELSE 0 END,
                planned_start = ?1,
                planned_end = ?2
             WHERE id = ?3 RETURNING *",
        )
        .bind(encode_opt_ts(planned_start))
        .bind(encode_opt_ts(planned_end))
        .bind(id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(TaskRow::into_task).transpose()
    }

    /// Arm or disarm the one-shot reminder of a task.
    ///
    /// Fixture helper: task editing lives in the web application, which
    /// writes these columns directly. Only tests call this.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_notify_at(
        &self,
        id: i64,
        notify_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Task>> {
        let row: Option<TaskRow> =
            sqlx::query_as("UPDATE task SET notify_at = ?1 WHERE id = ?2 RETURNING *")
                .bind(encode_opt_ts(notify_at))
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(TaskRow::into_task).transpose()
    }

    /// Suspend a task until `due`; the scanner moves it back to `Current` afterwards.
    ///
    /// Fixture helper: task editing lives in the web application, which
    /// writes these columns directly. Only tests call this.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn suspend_until(&self, id: i64, due: DateTime<Utc>) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            "UPDATE task SET type = 'someday', suspend_due = ?1 WHERE id = ?2 RETURNING *",
        )
        .bind(encode_ts(due))
        .bind(id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(TaskRow::into_task).transpose()
    }

    /// Return every task whose suspension ended at or before `now` to
    /// `Current` and clear `suspend_due`. Returns the affected task ids.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn resume_suspended(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "UPDATE task SET type = 'current', suspend_due = NULL
             WHERE suspend_due IS NOT NULL AND suspend_due <= ?1
             RETURNING id",
        )
        .bind(encode_ts(now))
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids)
    }

    /// Tasks whose `notify_at` is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn due_reminders(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> Result<Vec<TriggeredTask>> {
        let rows: Vec<TriggeredRow> = sqlx::query_as(
            "SELECT t.id, t.user_id, t.title, u.telegram_chat_id AS chat_id, t.planned_start
             FROM task t LEFT JOIN user u ON u.id = t.user_id
             WHERE t.notify_at IS NOT NULL AND t.notify_at <= ?1
             ORDER BY t.notify_at, t.id",
        )
        .bind(encode_ts(now))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(TriggeredRow::into_triggered).collect()
    }

    /// Clear the one-shot reminder of a task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn clear_notify_at(conn: &mut SqliteConnection, id: i64) -> Result<()> {
        sqlx::query("UPDATE task SET notify_at = NULL WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Tasks starting in `(now, window_end]` that have not been announced.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn upcoming_starts(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<TriggeredTask>> {
        let rows: Vec<TriggeredRow> = sqlx::query_as(
            "SELECT t.id, t.user_id, t.title, u.telegram_chat_id AS chat_id, t.planned_start
             FROM task t LEFT JOIN user u ON u.id = t.user_id
             WHERE t.planned_start IS NOT NULL
               AND t.planned_start > ?1 AND t.planned_start <= ?2
               AND t.planned_start_notified = 0
             ORDER BY t.planned_start, t.id",
        )
        .bind(encode_ts(now))
        .bind(encode_ts(window_end))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(TriggeredRow::into_triggered).collect()
    }

    /// Record that the "starting soon" notice for the current `planned_start` went out.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_start_notified(conn: &mut SqliteConnection, id: i64) -> Result<()> {
        sqlx::query("UPDATE task SET planned_start_notified = 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
