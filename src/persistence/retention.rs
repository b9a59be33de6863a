//! Retention service for time-based data purge.
//!
//! Runs as a background task removing expired link tokens and finished
//! jobs older than `retention_days`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::Database;
use super::job_repo::JobRepo;
use super::token_repo::TokenRepo;
use crate::clock::Clock;
use crate::{AppError, Result};

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Counts removed by one purge run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired link tokens removed.
    pub tokens: u64,
    /// Finished jobs removed.
    pub jobs: u64,
}

/// Spawn the retention purge background task.
///
/// The task runs hourly, starting immediately.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db, clock.as_ref(), retention_days).await {
                        error!(%err, "retention purge failed");
                    }
                }
            }
        }
    })
}

/// Run one purge pass.
///
/// # Errors
///
/// Returns `AppError::Config` if `retention_days` reaches before the
/// earliest representable instant, or `AppError::Db` if either delete fails.
pub async fn purge(db: &Arc<Database>, clock: &dyn Clock, retention_days: u32) -> Result<PurgeReport> {
    let now = clock.now();
    let cutoff = chrono::Duration::try_days(i64::from(retention_days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            AppError::Config(format!("retention_days {retention_days} is out of range"))
        })?;

    let tokens = TokenRepo::new(Arc::clone(db)).purge_expired(now).await?;
    let jobs = JobRepo::new(Arc::clone(db)).purge_finished(cutoff).await?;

    let report = PurgeReport { tokens, jobs };
    info!(retention_days, tokens, jobs, "retention purge completed");
    Ok(report)
}
