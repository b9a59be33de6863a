//! Persistence layer modules.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

pub mod db;
pub mod job_repo;
pub mod retention;
pub mod schema;
pub mod task_repo;
pub mod token_repo;
pub mod user_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Encode a timestamp as fixed-width RFC 3339 UTC text.
///
/// Every stored instant uses this form so that SQL string comparison
/// orders chronologically.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn encode_opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(encode_ts)
}

pub(crate) fn decode_ts(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

pub(crate) fn decode_opt_ts(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_ts(field, s)).transpose()
}
