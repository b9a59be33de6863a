//! Background job model for the notification queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskType;
use crate::{AppError, Result};

/// Discriminant of a [`JobPayload`], used as the handler table key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Deliver a text message to a chat.
    SendMessage,
    /// Reply to a chat with the linked user's open tasks.
    TaskList,
}

impl JobKind {
    /// Stable name stored in the `kind` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::TaskList => "task_list",
        }
    }
}

/// Typed job arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Send `text` to `chat_id`.
    SendMessage {
        /// Destination chat.
        chat_id: String,
        /// Message body.
        text: String,
    },
    /// List open tasks for the user linked to `chat_id`.
    TaskList {
        /// Requesting chat.
        chat_id: String,
        /// Optional type filter; `None` lists every type.
        task_type: Option<TaskType>,
    },
}

impl JobPayload {
    /// Convenience constructor for a message delivery.
    pub fn send_message(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::SendMessage {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }

    /// Kind of this payload.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        match self {
            Self::SendMessage { .. } => JobKind::SendMessage,
            Self::TaskList { .. } => JobKind::TaskList,
        }
    }

    /// Serialize for storage.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from storage.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the payload is malformed.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for `run_at`.
    Queued,
    /// Claimed by a worker under a lease.
    Running,
    /// Handled successfully.
    Done,
    /// Retries exhausted or payload unusable.
    Failed,
}

impl JobStatus {
    /// Database representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parse the database representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::Db(format!("invalid job status: {other}"))),
        }
    }
}

/// A unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Unique record identifier.
    pub id: String,
    /// Typed arguments.
    pub payload: JobPayload,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Attempts started so far.
    pub attempts: u32,
    /// Attempts allowed before the job fails.
    pub max_attempts: u32,
    /// Earliest time the job may run.
    pub run_at: DateTime<Utc>,
    /// Lease expiry while `Running`.
    pub locked_until: Option<DateTime<Utc>>,
    /// Error message from the most recent failed attempt.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Construct a new job due immediately.
    #[must_use]
    pub fn new(payload: JobPayload, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            run_at: now,
            locked_until: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Kind of the payload.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}
