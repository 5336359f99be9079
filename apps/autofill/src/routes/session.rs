use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::orchestrator::SessionSummary;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionSummary> {
    Json(state.orchestrator.summary().await)
}

/// POST /api/v1/session/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    let summary = state.orchestrator.login(email, &req.password).await?;
    Ok(Json(summary))
}

/// POST /api/v1/session/logout
pub async fn handle_logout(
    State(state): State<AppState>,
) -> Result<Json<SessionSummary>, AppError> {
    state.orchestrator.logout().await?;
    Ok(Json(state.orchestrator.summary().await))
}
