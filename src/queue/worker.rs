//! Queue worker: claims due jobs and dispatches them to handlers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::failure::FailureHook;
use super::handlers::HandlerTable;
use super::{FailureOutcome, JobQueue};
use crate::models::job::Job;
use crate::{AppError, Result};

/// Result of one worker step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No job was due.
    Idle,
    /// The job was handled successfully.
    Completed,
    /// The attempt failed and the job was re-queued.
    Retrying,
    /// The job was marked failed and reported.
    Failed,
    /// The lease lapsed mid-attempt; the job belongs to a later claim.
    LeaseLost,
}

/// Single-consumer worker loop.
pub struct Worker {
    queue: JobQueue,
    handlers: HandlerTable,
    hook: FailureHook,
    poll_interval: Duration,
}

impl Worker {
    /// Create a worker polling `queue` every `poll_interval` when idle.
    #[must_use]
    pub fn new(
        queue: JobQueue,
        handlers: HandlerTable,
        hook: FailureHook,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            handlers,
            hook,
            poll_interval,
        }
    }

    /// Claim and process at most one job.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` when queue bookkeeping fails, or
    /// `AppError::Queue` when a claimed job could not be decoded.
    pub async fn run_once(&self) -> Result<StepOutcome> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(StepOutcome::Idle);
        };
        self.process(job).await
    }

    async fn process(&self, job: Job) -> Result<StepOutcome> {
        // A lease that lapsed during the final attempt re-surfaces the job
        // with one attempt too many.
        if job.attempts > job.max_attempts {
            let err = AppError::Queue(format!(
                "lease expired after {} of {} attempts",
                job.max_attempts, job.max_attempts
            ));
            return self.fail_permanently(&job, &err).await;
        }

        let Some(handler) = self.handlers.get(&job.kind()) else {
            let err = AppError::Queue(format!("no handler for job kind {}", job.kind().as_str()));
            return self.fail_permanently(&job, &err).await;
        };

        debug!(job_id = %job.id, kind = job.kind().as_str(), attempt = job.attempts, "running job");
        match handler.handle(&job).await {
            Ok(()) => {
                if self.queue.complete(&job).await? {
                    Ok(StepOutcome::Completed)
                } else {
                    Ok(StepOutcome::LeaseLost)
                }
            }
            Err(err) => match self.queue.fail(&job, &err).await? {
                FailureOutcome::Retrying { run_at } => {
                    warn!(
                        job_id = %job.id,
                        attempt = job.attempts,
                        %run_at,
                        %err,
                        "job attempt failed; retry scheduled"
                    );
                    Ok(StepOutcome::Retrying)
                }
                FailureOutcome::Exhausted => {
                    self.hook.on_failure(&job, &err).await;
                    Ok(StepOutcome::Failed)
                }
                FailureOutcome::LeaseLost => {
                    warn!(job_id = %job.id, attempt = job.attempts, %err, "lease lost before failure was recorded");
                    Ok(StepOutcome::LeaseLost)
                }
            },
        }
    }

    async fn fail_permanently(&self, job: &Job, err: &AppError) -> Result<StepOutcome> {
        if !self.queue.fail_permanently(job, err).await? {
            warn!(job_id = %job.id, attempt = job.attempts, %err, "lease lost before failure was recorded");
            return Ok(StepOutcome::LeaseLost);
        }
        self.hook.on_failure(job, err).await;
        Ok(StepOutcome::Failed)
    }

    /// Process jobs until `cancel` fires. A job in progress is finished
    /// before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("queue worker started");
        while !cancel.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(StepOutcome::Idle) => true,
                Ok(_) => false,
                Err(err) => {
                    error!(%err, "queue worker step failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        info!("queue worker shutting down");
    }
}

/// Spawn `worker` on the runtime.
#[must_use]
pub fn spawn_worker(worker: Worker, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move { worker.run(cancel).await }.instrument(info_span!("worker")))
}
