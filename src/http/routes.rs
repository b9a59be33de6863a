//! Route handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AuthenticatedUser, InternalCaller};
use super::ApiState;
use crate::models::job::JobPayload;
use crate::models::task::Task;
use crate::models::user::User;
use crate::{AppError, Result};

/// Liveness check.
pub async fn health() -> &'static str {
    "ok"
}

/// Response of `POST /telegram/connect`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectResponse {
    /// One-time link token.
    pub token: String,
    /// Bot handle.
    pub bot_username: String,
    /// `t.me` URL opening the bot with the token as start payload.
    pub deep_link: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

/// Issue a link token for the signed-in user.
pub async fn connect(
    State(state): State<Arc<ApiState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<ConnectResponse>> {
    let Some(bot_username) = state.bot_username.clone() else {
        return Err(AppError::ConfigurationMissing(
            "telegram.bot_username is not configured".into(),
        ));
    };

    let token = state.links.issue(user_id).await?;
    let deep_link = format!("https://t.me/{bot_username}?start={}", token.token);

    Ok(Json(ConnectResponse {
        token: token.token,
        bot_username,
        deep_link,
        expires_in: state.links.ttl().num_seconds(),
    }))
}

/// Remove the signed-in user's Telegram link.
pub async fn disconnect(
    State(state): State<Arc<ApiState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<User>> {
    Ok(Json(state.links.unlink(user_id).await?))
}

/// Body of `POST /telegram/link`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkRequest {
    /// Token from the deep link.
    pub token: String,
    /// Chat the token was presented from.
    pub chat_id: String,
    /// Telegram handle of the sender.
    #[serde(default)]
    pub username: Option<String>,
}

/// Resolve a link token on behalf of an out-of-process bot.
pub async fn link(
    State(state): State<Arc<ApiState>>,
    _caller: InternalCaller,
    Json(body): Json<LinkRequest>,
) -> Result<Json<User>> {
    let user = state
        .links
        .resolve(&body.token, &body.chat_id, body.username.as_deref())
        .await?;
    Ok(Json(user))
}

/// Body of `POST /telegram/error-report`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Report text.
    pub message: String,
}

/// Acknowledgement of a queued error report.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportAccepted {
    /// Always `queued`.
    pub status: String,
    /// Job delivering the report.
    pub job_id: String,
}

/// Queue a front-end error report for the admin chat.
pub async fn error_report(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<ErrorReport>,
) -> Result<(StatusCode, Json<ReportAccepted>)> {
    let Some(chat_id) = state.admin_chat_id.clone() else {
        return Err(AppError::ConfigurationMissing(
            "telegram.admin_chat_id is not configured".into(),
        ));
    };

    let job = state
        .queue
        .enqueue(JobPayload::send_message(chat_id, body.message))
        .await?;
    info!(job_id = %job.id, "error report queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(ReportAccepted {
            status: "queued".into(),
            job_id: job.id,
        }),
    ))
}

/// Fetch one task for an internal caller.
pub async fn get_task(
    State(state): State<Arc<ApiState>>,
    _caller: InternalCaller,
    Path(id): Path<i64>,
) -> Result<Json<Task>> {
    state
        .tasks
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))
}
