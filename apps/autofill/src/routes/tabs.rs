use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::dom::{Document, DomMutation, NodeSnapshot};
use crate::errors::AppError;
use crate::orchestrator::SessionSummary;
use crate::page::{PageAgent, PageChannel, PageRequest, PageResponse};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabCreatedResponse {
    pub tab_id: Uuid,
    pub generation: u64,
}

#[derive(Serialize)]
pub struct DocumentReplacedResponse {
    pub generation: u64,
}

#[derive(Deserialize)]
pub struct DetachRequest {
    pub paths: Vec<Vec<usize>>,
}

#[derive(Serialize)]
pub struct DetachResponse {
    pub detached: usize,
}

#[derive(Serialize)]
pub struct MutationsResponse {
    pub mutations: Vec<DomMutation>,
}

/// POST /api/v1/tabs
pub async fn handle_open_tab(
    State(state): State<AppState>,
    Json(snapshot): Json<NodeSnapshot>,
) -> (StatusCode, Json<TabCreatedResponse>) {
    let document = Document::from_snapshot(&snapshot);
    let generation = document.generation();
    let tab_id = state.open_tab(PageAgent::spawn(document)).await;
    info!("Opened tab {tab_id}");

    (
        StatusCode::CREATED,
        Json(TabCreatedResponse { tab_id, generation }),
    )
}

/// PUT /api/v1/tabs/:id/document
pub async fn handle_replace_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(snapshot): Json<NodeSnapshot>,
) -> Result<Json<DocumentReplacedResponse>, AppError> {
    let tab = state.tab(id).await?;
    match tab.request(PageRequest::ReplaceDocument(snapshot)).await? {
        PageResponse::Replaced { generation } => Ok(Json(DocumentReplacedResponse { generation })),
        other => Err(unexpected(other)),
    }
}

/// DELETE /api/v1/tabs/:id
pub async fn handle_close_tab(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.close_tab(id).await {
        return Err(AppError::NotFound(format!("Tab {id} not found")));
    }
    info!("Closed tab {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tabs/:id/detach
/// The content script reports elements the page removed since the snapshot.
pub async fn handle_detach(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DetachRequest>,
) -> Result<Json<DetachResponse>, AppError> {
    if req.paths.is_empty() {
        return Err(AppError::Validation("paths must not be empty".to_string()));
    }
    let tab = state.tab(id).await?;
    match tab.request(PageRequest::Detach { paths: req.paths }).await? {
        PageResponse::Detached { detached } => Ok(Json(DetachResponse { detached })),
        other => Err(unexpected(other)),
    }
}

/// POST /api/v1/tabs/:id/scan
pub async fn handle_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let tab = state.tab(id).await?;
    Ok(Json(state.orchestrator.scan(&tab).await?))
}

/// POST /api/v1/tabs/:id/fill
pub async fn handle_fill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let tab = state.tab(id).await?;
    Ok(Json(state.orchestrator.fill(&tab).await?))
}

/// GET /api/v1/tabs/:id/mutations
/// Writes recorded since the previous call; each write is returned once.
pub async fn handle_mutations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationsResponse>, AppError> {
    let tab = state.tab(id).await?;
    match tab.request(PageRequest::Mutations).await? {
        PageResponse::Mutations { mutations } => Ok(Json(MutationsResponse { mutations })),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: PageResponse) -> AppError {
    AppError::Internal(anyhow::anyhow!("unexpected page response: {response:?}"))
}
