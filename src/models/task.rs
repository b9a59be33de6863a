//! Task model with the time-based trigger fields read by the scanner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Completion state of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet done.
    Open,
    /// Completed.
    Done,
    /// Hidden from active lists.
    Archived,
}

impl TaskStatus {
    /// Database representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Parse the database representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            other => Err(AppError::Db(format!("invalid task status: {other}"))),
        }
    }
}

/// Planning bucket of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Captured, not yet triaged.
    Inbox,
    /// Being worked on now.
    Current,
    /// Deferred without a date; suspended tasks return to `Current`.
    Someday,
    /// Bound to a calendar slot.
    Calendar,
    /// Rest / leisure items.
    Rest,
    /// Recurring routine.
    Routine,
}

impl TaskType {
    /// All variants, in display order.
    pub const ALL: [Self; 6] = [
        Self::Inbox,
        Self::Current,
        Self::Someday,
        Self::Calendar,
        Self::Rest,
        Self::Routine,
    ];

    /// Database representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Current => "current",
            Self::Someday => "someday",
            Self::Calendar => "calendar",
            Self::Rest => "rest",
            Self::Routine => "routine",
        }
    }

    /// Parse a type name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Parse the database representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| AppError::Db(format!("invalid task type: {s}")))
    }
}

/// A user's task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Row identifier.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Short title.
    pub title: String,
    /// Free-text detail.
    pub details: Option<String>,
    /// Completion state.
    pub status: TaskStatus,
    /// Planning bucket.
    pub task_type: TaskType,
    /// Due date.
    pub deadline: Option<DateTime<Utc>>,
    /// Estimated duration in minutes.
    pub duration: Option<i64>,
    /// Start of the planned calendar window.
    pub planned_start: Option<DateTime<Utc>>,
    /// End of the planned calendar window.
    pub planned_end: Option<DateTime<Utc>>,
    /// When a suspended task returns to `Current`.
    pub suspend_due: Option<DateTime<Utc>>,
    /// One-shot reminder time; cleared once processed.
    pub notify_at: Option<DateTime<Utc>>,
    /// Whether the "starting soon" notice went out for the current `planned_start`.
    pub planned_start_notified: bool,
}

/// Fields for inserting a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Owning user.
    pub user_id: i64,
    /// Short title.
    pub title: String,
    /// Free-text detail.
    pub details: Option<String>,
    /// Planning bucket.
    pub task_type: TaskType,
    /// Due date.
    pub deadline: Option<DateTime<Utc>>,
    /// Estimated duration in minutes.
    pub duration: Option<i64>,
    /// Start of the planned window.
    pub planned_start: Option<DateTime<Utc>>,
    /// End of the planned window.
    pub planned_end: Option<DateTime<Utc>>,
    /// Suspension end.
    pub suspend_due: Option<DateTime<Utc>>,
    /// One-shot reminder time.
    pub notify_at: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Minimal open inbox task with no time fields set.
    #[must_use]
    pub fn new(user_id: i64, title: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            details: None,
            task_type: TaskType::Inbox,
            deadline: None,
            duration: None,
            planned_start: None,
            planned_end: None,
            suspend_due: None,
            notify_at: None,
        }
    }
}
