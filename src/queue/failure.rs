//! Failure reporting for jobs that exhausted their attempts.

use std::sync::Arc;

use tracing::{error, warn};

use crate::models::job::Job;
use crate::telegram::Messenger;
use crate::AppError;

/// Reports permanently failed jobs to the log and, when configured, to an
/// operator chat. Reporting never fails the worker.
#[derive(Clone)]
pub struct FailureHook {
    messenger: Arc<dyn Messenger>,
    admin_chat_id: Option<String>,
}

impl FailureHook {
    /// Create a hook; `admin_chat_id` of `None` keeps reports in the log only.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, admin_chat_id: Option<String>) -> Self {
        Self {
            messenger,
            admin_chat_id,
        }
    }

    /// Render the operator report for `job`.
    #[must_use]
    pub fn report_text(job: &Job, err: &AppError) -> String {
        format!(
            "Job failed: {} ({})\nAttempts: {}/{}\nError: {}\n{}",
            job.id,
            job.kind().as_str(),
            job.attempts,
            job.max_attempts,
            err.kind(),
            err
        )
    }

    /// Record a permanent failure. Delivery errors are logged and swallowed.
    pub async fn on_failure(&self, job: &Job, err: &AppError) {
        error!(
            job_id = %job.id,
            kind = job.kind().as_str(),
            attempts = job.attempts,
            error_kind = err.kind(),
            %err,
            "job failed permanently"
        );

        let Some(chat_id) = self.admin_chat_id.as_deref() else {
            warn!(job_id = %job.id, "no admin chat configured; failure report not sent");
            return;
        };

        let text = Self::report_text(job, err);
        if let Err(report_err) = self.messenger.send_message(chat_id, &text).await {
            error!(job_id = %job.id, %report_err, "failure report delivery failed");
        }
    }
}
