//! Job queue repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::job::{Job, JobPayload, JobStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::{decode_opt_ts, decode_ts, encode_opt_ts, encode_ts};

/// Repository wrapper around `SQLite` for queued jobs.
#[derive(Clone)]
pub struct JobRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    #[allow(dead_code)]
    kind: String,
    payload: String,
    status: String,
    attempts: i64,
    max_attempts: i64,
    run_at: String,
    locked_until: Option<String>,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            payload: JobPayload::from_json(&self.payload)?,
            status: JobStatus::parse(&self.status)?,
            attempts: u32::try_from(self.attempts)
                .map_err(|e| AppError::Db(format!("invalid attempts: {e}")))?,
            max_attempts: u32::try_from(self.max_attempts)
                .map_err(|e| AppError::Db(format!("invalid max_attempts: {e}")))?,
            run_at: decode_ts("run_at", &self.run_at)?,
            locked_until: decode_opt_ts("locked_until", self.locked_until.as_deref())?,
            last_error: self.last_error,
            created_at: decode_ts("created_at", &self.created_at)?,
            updated_at: decode_ts("updated_at", &self.updated_at)?,
            id: self.id,
        })
    }
}

impl JobRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a job using the pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, job: &Job) -> Result<Job> {
        let mut conn = self.db.acquire().await?;
        Self::insert_with(&mut conn, job).await
    }

    /// Insert a job on the caller's connection, joining any open transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, or `AppError::Queue` if
    /// the payload cannot be serialized.
    pub async fn insert_with(conn: &mut SqliteConnection, job: &Job) -> Result<Job> {
        let payload = job.payload.to_json()?;

        sqlx::query(
            "INSERT INTO job (id, kind, payload, status, attempts, max_attempts, run_at,
             locked_until, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&job.id)
        .bind(job.kind().as_str())
        .bind(&payload)
        .bind(job.status.as_str())
        .bind(i64::from(job.attempts))
        .bind(i64::from(job.max_attempts))
        .bind(encode_ts(job.run_at))
        .bind(encode_opt_ts(job.locked_until))
        .bind(&job.last_error)
        .bind(encode_ts(job.created_at))
        .bind(encode_ts(job.updated_at))
        .execute(&mut *conn)
        .await?;

        Ok(job.clone())
    }

    /// Retrieve a job by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM job WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(JobRow::into_job).transpose()
    }

    /// List jobs in a given status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM job WHERE status = ?1 ORDER BY created_at, id")
                .bind(status.as_str())
                .fetch_all(self.db.as_ref())
                .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Claim the next due job for this worker.
    ///
    /// A job is due when it is queued with `run_at <= now`, or running with
    /// an expired lease (its previous worker died). The claim is a single
    /// `UPDATE … RETURNING`, so each job goes to exactly one claimant. The
    /// attempt counter is incremented on claim.
    ///
    /// A job whose stored payload cannot be decoded is marked failed and
    /// reported as `AppError::Queue`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the claim fails.
    pub async fn claim_next(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let now_s = encode_ts(now);
        let row: Option<JobRow> = sqlx::query_as(
            "UPDATE job SET status = 'running', attempts = attempts + 1,
                    locked_until = ?2, updated_at = ?1
             WHERE id = (
                SELECT id FROM job
                WHERE (status = 'queued' AND run_at <= ?1)
                   OR (status = 'running' AND locked_until <= ?1)
                ORDER BY run_at, created_at
                LIMIT 1
             )
             RETURNING *",
        )
        .bind(&now_s)
        .bind(encode_ts(lease_until))
        .fetch_optional(self.db.as_ref())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id = row.id.clone();
        let attempts = u32::try_from(row.attempts).unwrap_or(u32::MAX);
        match row.into_job() {
            Ok(job) => Ok(Some(job)),
            Err(err) => {
                self.mark_failed(&id, attempts, &err.to_string(), now).await?;
                Err(AppError::Queue(format!("job {id} is unreadable: {err}")))
            }
        }
    }

    /// Mark a running job as done.
    ///
    /// Only the holder of the current lease may finish a job: the update
    /// matches on `status = 'running'` and the `attempts` value seen at
    /// claim time. Returns `false` when the lease was lost to a later
    /// claim.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_done(&self, id: &str, attempts: u32, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE job SET status = 'done', locked_until = NULL, last_error = NULL,
             updated_at = ?1
             WHERE id = ?2 AND status = 'running' AND attempts = ?3",
        )
        .bind(encode_ts(now))
        .bind(id)
        .bind(i64::from(attempts))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put a running job back in the queue to run again at `run_at`.
    ///
    /// Guarded by the lease like [`mark_done`](Self::mark_done).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn reschedule(
        &self,
        id: &str,
        attempts: u32,
        run_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE job SET status = 'queued', run_at = ?1, locked_until = NULL,
             last_error = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'running' AND attempts = ?5",
        )
        .bind(encode_ts(run_at))
        .bind(error)
        .bind(encode_ts(now))
        .bind(id)
        .bind(i64::from(attempts))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark a running job as permanently failed.
    ///
    /// Guarded by the lease like [`mark_done`](Self::mark_done).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_failed(
        &self,
        id: &str,
        attempts: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE job SET status = 'failed', locked_until = NULL, last_error = ?1,
             updated_at = ?2
             WHERE id = ?3 AND status = 'running' AND attempts = ?4",
        )
        .bind(error)
        .bind(encode_ts(now))
        .bind(id)
        .bind(i64::from(attempts))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete finished (done or failed) jobs last touched before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge_finished(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM job WHERE status IN ('done', 'failed') AND updated_at < ?1",
        )
        .bind(encode_ts(cutoff))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}
