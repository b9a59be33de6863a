//! Durable notification job queue.
//!
//! [`JobQueue`] layers the retry policy and the injected clock over
//! [`JobRepo`]. Delivery is at-least-once: a claimed job is leased, and a
//! lease that expires without `complete`/`fail` makes the job claimable
//! again.

pub mod failure;
pub mod handlers;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::QueueConfig;
use crate::models::job::{Job, JobPayload};
use crate::persistence::db::Database;
use crate::persistence::job_repo::JobRepo;
use crate::{AppError, Result};

/// Retry, lease, and polling policy for the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before a job is marked failed.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the retry delay.
    pub max_delay: Duration,
    /// Visibility timeout of a claimed job.
    pub lease: Duration,
}

impl RetryPolicy {
    /// Build the policy from configuration.
    #[must_use]
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs(config.retry_base_seconds),
            max_delay: Duration::from_secs(config.retry_max_seconds),
            lease: Duration::from_secs(config.lease_seconds),
        }
    }

    /// Delay before the next run after `attempts` failed attempts:
    /// `base * 2^(attempts - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Re-queued to run again at the given instant.
    Retrying {
        /// Next eligible run time.
        run_at: DateTime<Utc>,
    },
    /// Attempts exhausted; the job is marked failed.
    Exhausted,
    /// The lease lapsed and another claim owns the job; nothing was written.
    LeaseLost,
}

/// Handle to the durable job queue.
#[derive(Clone)]
pub struct JobQueue {
    repo: JobRepo,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl JobQueue {
    /// Create a queue over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            repo: JobRepo::new(db),
            clock,
            policy,
        }
    }

    /// Active retry policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Underlying repository, for inspection.
    #[must_use]
    pub fn repo(&self) -> &JobRepo {
        &self.repo
    }

    /// Submit a job that runs as soon as a worker is free.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn enqueue(&self, payload: JobPayload) -> Result<Job> {
        let job = Job::new(payload, self.policy.max_attempts, self.clock.now());
        let job = self.repo.insert(&job).await?;
        debug!(job_id = %job.id, kind = job.kind().as_str(), "job enqueued");
        Ok(job)
    }

    /// Submit a job on the caller's connection.
    ///
    /// The insert commits or rolls back with the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn enqueue_with(
        &self,
        conn: &mut SqliteConnection,
        payload: JobPayload,
    ) -> Result<Job> {
        let job = Job::new(payload, self.policy.max_attempts, self.clock.now());
        let job = JobRepo::insert_with(conn, &job).await?;
        debug!(job_id = %job.id, kind = job.kind().as_str(), "job enqueued in transaction");
        Ok(job)
    }

    /// Claim the next due job, leasing it to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on store failure, or `AppError::Queue` if the
    /// claimed job was unreadable (it is marked failed).
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        let now = self.clock.now();
        let lease = chrono::Duration::from_std(self.policy.lease)
            .map_err(|err| AppError::Config(format!("lease out of range: {err}")))?;
        self.repo.claim_next(now, now + lease).await
    }

    /// Mark a claimed job as handled.
    ///
    /// Returns `false` if the lease lapsed and the job was claimed again.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn complete(&self, job: &Job) -> Result<bool> {
        let held = self
            .repo
            .mark_done(&job.id, job.attempts, self.clock.now())
            .await?;
        if !held {
            warn!(job_id = %job.id, attempt = job.attempts, "lease lost before completion");
        }
        Ok(held)
    }

    /// Record a failed attempt and either re-queue with backoff or mark failed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn fail(&self, job: &Job, error: &AppError) -> Result<FailureOutcome> {
        let now = self.clock.now();
        let message = error.to_string();

        if job.attempts >= job.max_attempts {
            let held = self
                .repo
                .mark_failed(&job.id, job.attempts, &message, now)
                .await?;
            return Ok(if held {
                FailureOutcome::Exhausted
            } else {
                FailureOutcome::LeaseLost
            });
        }

        let delay = chrono::Duration::from_std(self.policy.delay_after(job.attempts))
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        let run_at = now + delay;
        let held = self
            .repo
            .reschedule(&job.id, job.attempts, run_at, &message, now)
            .await?;
        Ok(if held {
            FailureOutcome::Retrying { run_at }
        } else {
            FailureOutcome::LeaseLost
        })
    }

    /// Mark a job failed without retrying.
    ///
    /// Returns `false` if the lease lapsed and the job was claimed again.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn fail_permanently(&self, job: &Job, error: &AppError) -> Result<bool> {
        self.repo
            .mark_failed(&job.id, job.attempts, &error.to_string(), self.clock.now())
            .await
    }
}
