//! Reminder scanner.
//!
//! One pass moves expired suspensions back to `Current`, fires one-shot
//! `notify_at` reminders, and announces tasks whose planned start falls in
//! the look-ahead window. Every field write and every job it implies share
//! one transaction, so a pass either lands whole or not at all.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::clock::Clock;
use crate::models::job::JobPayload;
use crate::persistence::db::Database;
use crate::persistence::task_repo::{TaskRepo, TriggeredTask};
use crate::queue::JobQueue;
use crate::Result;

/// Counts from one scan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Suspended tasks returned to `Current`.
    pub resumed: usize,
    /// `notify_at` reminders cleared.
    pub reminders: usize,
    /// "Starting soon" flags set.
    pub upcoming: usize,
    /// Notification jobs submitted.
    pub enqueued: usize,
}

impl ScanReport {
    /// Whether the pass changed anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resumed == 0 && self.reminders == 0 && self.upcoming == 0
    }
}

/// Reminder text for a fired `notify_at`.
#[must_use]
pub fn reminder_text(task: &TriggeredTask) -> String {
    format!("Reminder for task: {} (ID: {})", task.title, task.id)
}

/// Notice text for a task entering the look-ahead window.
#[must_use]
pub fn starting_soon_text(task: &TriggeredTask) -> String {
    match task.planned_start {
        Some(start) => format!(
            "Starting soon: {} (ID: {}) at {} UTC",
            task.title,
            task.id,
            start.format("%Y-%m-%d %H:%M")
        ),
        None => format!("Starting soon: {} (ID: {})", task.title, task.id),
    }
}

/// Scans the task store and submits notification jobs.
#[derive(Clone)]
pub struct ReminderScanner {
    db: Arc<Database>,
    queue: JobQueue,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
}

impl ReminderScanner {
    /// Create a scanner announcing planned starts up to `window` ahead.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        queue: JobQueue,
        clock: Arc<dyn Clock>,
        window: chrono::Duration,
    ) -> Self {
        Self {
            db,
            queue,
            clock,
            window,
        }
    }

    /// Run one pass at the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store fails; nothing from the pass is
    /// committed in that case.
    pub async fn scan(&self) -> Result<ScanReport> {
        self.scan_at(self.clock.now()).await
    }

    /// Run one pass as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the store fails; nothing from the pass is
    /// committed in that case.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let mut tx = self.db.begin().await?;

        let resumed = TaskRepo::resume_suspended(&mut tx, now).await?;
        for task_id in &resumed {
            debug!(task_id, "suspended task resumed");
        }
        report.resumed = resumed.len();

        for task in TaskRepo::due_reminders(&mut tx, now).await? {
            if let Some(chat_id) = task.chat_id.as_deref() {
                self.queue
                    .enqueue_with(&mut tx, JobPayload::send_message(chat_id, reminder_text(&task)))
                    .await?;
                report.enqueued += 1;
            } else {
                debug!(task_id = task.id, user_id = task.user_id, "owner not linked; reminder dropped");
            }
            TaskRepo::clear_notify_at(&mut tx, task.id).await?;
            report.reminders += 1;
        }

        for task in TaskRepo::upcoming_starts(&mut tx, now, now + self.window).await? {
            if let Some(chat_id) = task.chat_id.as_deref() {
                self.queue
                    .enqueue_with(
                        &mut tx,
                        JobPayload::send_message(chat_id, starting_soon_text(&task)),
                    )
                    .await?;
                report.enqueued += 1;
            } else {
                debug!(task_id = task.id, user_id = task.user_id, "owner not linked; start notice dropped");
            }
            TaskRepo::mark_start_notified(&mut tx, task.id).await?;
            report.upcoming += 1;
        }

        tx.commit().await?;

        if report.is_empty() {
            debug!("scan pass found nothing due");
        } else {
            info!(
                resumed = report.resumed,
                reminders = report.reminders,
                upcoming = report.upcoming,
                enqueued = report.enqueued,
                "scan pass completed"
            );
        }
        Ok(report)
    }
}

/// Spawn the periodic scanner.
///
/// Passes run one after another in this task; ticks missed while a pass
/// runs are skipped. A failed pass is logged and the next tick starts over.
#[must_use]
pub fn spawn_scanner_task(
    scanner: ReminderScanner,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = interval.as_secs(), "reminder scanner started");

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("reminder scanner shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = scanner.scan().await {
                            error!(%err, "scan pass failed");
                        }
                    }
                }
            }
        }
        .instrument(info_span!("scanner")),
    )
}
