//! Web API: account linking endpoints and internal service routes.

pub mod auth;
pub mod routes;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GlobalConfig;
use crate::linking::LinkService;
use crate::persistence::task_repo::TaskRepo;
use crate::queue::JobQueue;
use crate::{AppError, Result};

/// Shared state behind every route.
#[derive(Clone)]
pub struct ApiState {
    /// Token issuance and resolution.
    pub links: LinkService,
    /// Task lookups for internal callers.
    pub tasks: TaskRepo,
    /// Queue for error reports.
    pub queue: JobQueue,
    /// Bot handle used to build deep links.
    pub bot_username: Option<String>,
    /// Destination of error reports.
    pub admin_chat_id: Option<String>,
    /// Shared secret for internal routes.
    pub internal_token: Option<String>,
}

impl ApiState {
    /// Assemble state from services and the Telegram/internal settings of `config`.
    #[must_use]
    pub fn new(links: LinkService, tasks: TaskRepo, queue: JobQueue, config: &GlobalConfig) -> Self {
        Self {
            links,
            tasks,
            queue,
            bot_username: config.telegram.bot_username.clone(),
            admin_chat_id: config.telegram.admin_chat_id.clone(),
            internal_token: config.internal_token.clone(),
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/telegram/connect", post(routes::connect))
        .route("/telegram/disconnect", post(routes::disconnect))
        .route("/telegram/link", post(routes::link))
        .route("/telegram/error-report", post(routes::error_report))
        .route("/internal/tasks/{id}", get(routes::get_task))
        .with_state(state)
}

/// Serve the API on `listener` until `cancel` fires, then drain.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(state: Arc<ApiState>, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "web api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("web api server error: {err}")))?;

    info!("web api shut down");
    Ok(())
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyLinked(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ConfigurationMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(err = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
