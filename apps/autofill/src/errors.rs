use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orchestrator::OrchestratorError;
use crate::page::ChannelError;
use crate::profile_client::ProfileError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("Page error: {0}")]
    Page(#[from] ChannelError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Orchestrator(e) => {
                let (status, code) = orchestrator_status(e);
                (status, code, e.user_message())
            }
            AppError::Page(e) => {
                tracing::warn!("Page agent error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "PAGE_ERROR",
                    "Could not talk to the page. Reload the page and try again.".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

fn orchestrator_status(e: &OrchestratorError) -> (StatusCode, &'static str) {
    if e.is_retryable() {
        tracing::warn!("Retryable failure: {e}");
    } else {
        tracing::error!("Operation failed: {e}");
    }

    match e {
        OrchestratorError::Busy => (StatusCode::CONFLICT, "BUSY"),
        OrchestratorError::NotAuthenticated
        | OrchestratorError::Profile(ProfileError::Unauthorized) => {
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
        }
        OrchestratorError::NothingToFill => (StatusCode::CONFLICT, "NOTHING_TO_FILL"),
        OrchestratorError::SessionEnded(_) => (StatusCode::CONFLICT, "SESSION_ENDED"),
        OrchestratorError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        OrchestratorError::Channel(_)
        | OrchestratorError::Page(_)
        | OrchestratorError::UnexpectedResponse(_) => (StatusCode::BAD_GATEWAY, "PAGE_ERROR"),
        OrchestratorError::Profile(_) => (StatusCode::BAD_GATEWAY, "PROFILE_SERVICE_ERROR"),
        OrchestratorError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
