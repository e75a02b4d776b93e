use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::Job;
use crate::linking;
use crate::models::guidelines::{fetch_guidelines, ContentGuidelinesRow};
use crate::models::suggestion::{
    AlertRow, AutoOptimizeChangeRow, ChangeStatus, InternalLinkSuggestionRow,
};
use crate::optimize;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: Option<ChangeStatus>,
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct ChangeListResponse {
    pub changes: Vec<AutoOptimizeChangeRow>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct LinkListResponse {
    pub suggestions: Vec<InternalLinkSuggestionRow>,
    pub total: usize,
}

/// POST /api/v1/pages/:id/score
/// Enqueues scoring; the worker defers to keyword analysis when needed.
pub async fn handle_trigger_score(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state
        .queue
        .enqueue(Job::ScorePage {
            page_id,
            page_text: None,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))))
}

/// POST /api/v1/projects/:id/import
pub async fn handle_trigger_import(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ImportRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state
        .queue
        .enqueue(Job::ImportPages {
            project_id,
            user_id: req.user_id,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))))
}

/// POST /api/v1/projects/:id/alerts
pub async fn handle_trigger_alerts(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state
        .queue
        .enqueue(Job::EvaluateProjectChanges { project_id })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))))
}

/// GET /api/v1/pages/:id/guidelines
pub async fn handle_get_guidelines(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<ContentGuidelinesRow>, AppError> {
    let guidelines = fetch_guidelines(&state.db, page_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "No content guidelines for this page. Run keyword analysis first.".to_string(),
            )
        })?;
    Ok(Json(guidelines))
}

/// POST /api/v1/pages/:id/optimize
pub async fn handle_generate_changes(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<ChangeListResponse>, AppError> {
    let changes = optimize::generate_suggestions(
        &state.db,
        &state.analyzer,
        state.fetcher.as_ref(),
        state.generator.as_ref(),
        page_id,
    )
    .await?;
    let total = changes.len();
    Ok(Json(ChangeListResponse { changes, total }))
}

/// GET /api/v1/pages/:id/changes
pub async fn handle_list_changes(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
    Query(params): Query<StatusQuery>,
) -> Result<Json<ChangeListResponse>, AppError> {
    let changes = optimize::list_changes(&state.db, page_id, params.status).await?;
    let total = changes.len();
    Ok(Json(ChangeListResponse { changes, total }))
}

/// POST /api/v1/changes/:id/apply
pub async fn handle_apply_change(
    State(state): State<AppState>,
    Path(change_id): Path<Uuid>,
) -> Result<Json<AutoOptimizeChangeRow>, AppError> {
    Ok(Json(optimize::apply_change(&state.db, change_id).await?))
}

/// POST /api/v1/changes/:id/reject
pub async fn handle_reject_change(
    State(state): State<AppState>,
    Path(change_id): Path<Uuid>,
) -> Result<Json<AutoOptimizeChangeRow>, AppError> {
    Ok(Json(optimize::reject_change(&state.db, change_id).await?))
}

/// POST /api/v1/pages/:id/links
pub async fn handle_generate_links(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<LinkListResponse>, AppError> {
    let suggestions = linking::generate_link_suggestions(&state.db, page_id).await?;
    let total = suggestions.len();
    Ok(Json(LinkListResponse { suggestions, total }))
}

/// GET /api/v1/pages/:id/links
pub async fn handle_list_links(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
    Query(params): Query<StatusQuery>,
) -> Result<Json<LinkListResponse>, AppError> {
    let suggestions = linking::list_suggestions(&state.db, page_id, params.status).await?;
    let total = suggestions.len();
    Ok(Json(LinkListResponse { suggestions, total }))
}

/// POST /api/v1/links/:id/apply
pub async fn handle_apply_link(
    State(state): State<AppState>,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<InternalLinkSuggestionRow>, AppError> {
    Ok(Json(linking::apply_suggestion(&state.db, suggestion_id).await?))
}

/// POST /api/v1/pages/:id/alerts
pub async fn handle_trigger_page_alerts(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state
        .queue
        .enqueue(Job::EvaluatePageChanges { page_id })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))))
}

/// GET /api/v1/pages/:id/alerts
pub async fn handle_list_alerts(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Vec<AlertRow>>, AppError> {
    let alerts = sqlx::query_as::<_, AlertRow>(
        "SELECT * FROM alerts WHERE audit_page_id = $1 ORDER BY created_at DESC",
    )
    .bind(page_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(alerts))
}

/// POST /api/v1/links/:id/reject
pub async fn handle_reject_link(
    State(state): State<AppState>,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<InternalLinkSuggestionRow>, AppError> {
    Ok(Json(linking::reject_suggestion(&state.db, suggestion_id).await?))
}
