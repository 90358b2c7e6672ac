//! Axum route handlers for highlight capture and management.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::highlight::Highlight;
use crate::state::AppState;
use crate::store::Profile;

#[derive(Debug, Deserialize)]
pub struct CreateHighlightRequest {
    pub value: String,
    pub source_url: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct HighlightListResponse {
    pub highlights: Vec<Highlight>,
}

/// GET /api/v1/highlights
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<HighlightListResponse>, AppError> {
    let highlights = state.store.get_all().await?;
    Ok(Json(HighlightListResponse { highlights }))
}

/// POST /api/v1/highlights
pub async fn handle_create(
    State(state): State<AppState>,
    Json(request): Json<CreateHighlightRequest>,
) -> Result<(StatusCode, Json<Highlight>), AppError> {
    if request.value.trim().is_empty() {
        return Err(AppError::Validation("value cannot be empty".to_string()));
    }

    let highlight = state
        .store
        .create(Highlight::new(
            request.value,
            request.source_url,
            request.notes,
        ))
        .await?;
    Ok((StatusCode::CREATED, Json(highlight)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateHighlightRequest {
    pub value: String,
    pub collections: Vec<String>,
    pub notes: String,
}

/// PUT /api/v1/highlights/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateHighlightRequest>,
) -> Result<Json<Highlight>, AppError> {
    let existing = state
        .store
        .get_all()
        .await?
        .into_iter()
        .find(|h| h.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Highlight {id} not found")))?;

    let updated = state
        .store
        .update(Highlight {
            value: request.value,
            collections: request.collections,
            notes: request.notes,
            ..existing
        })
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/highlights/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<String>,
}

/// GET /api/v1/collections
///
/// Distinct labels across all highlights, sorted.
pub async fn handle_collections(
    State(state): State<AppState>,
) -> Result<Json<CollectionsResponse>, AppError> {
    let highlights = state.store.get_all().await?;
    let collections: BTreeSet<String> = highlights
        .iter()
        .flat_map(|h| h.collections.iter().cloned())
        .collect();
    Ok(Json(CollectionsResponse {
        collections: collections.into_iter().collect(),
    }))
}

/// GET /api/v1/profile/export
pub async fn handle_export(State(state): State<AppState>) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.store.export_profile().await?))
}

/// POST /api/v1/profile/import
pub async fn handle_import(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<StatusCode, AppError> {
    state.store.import_profile(profile).await?;
    Ok(StatusCode::NO_CONTENT)
}
