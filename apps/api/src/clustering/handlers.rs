//! Axum route handlers for the AI clustering API.
//!
//! Review is two-phase over HTTP: `cluster` returns the suggestion set
//! (every suggestion pre-selected client-side), `apply` commits whatever
//! subset the user kept. Not calling `apply` is the cancel path and changes
//! nothing. `auto_apply` short-circuits review for clients that want the
//! original one-shot behavior.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::clustering::orchestrator::{AcceptAll, PreparedRun, RunReport};
use crate::clustering::CollectionSuggestion;
use crate::errors::AppError;
use crate::models::highlight::Highlight;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// GET /api/v1/ai/availability
pub async fn handle_availability(State(state): State<AppState>) -> Json<AvailabilityResponse> {
    let reason = state.backend.availability().await.blocking_reason();
    Json(AvailabilityResponse {
        available: reason.is_none(),
        reason,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterRequest {
    #[serde(default)]
    pub auto_apply: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ClusterResponse {
    Prepared(PreparedRun),
    Report(RunReport),
}

/// POST /api/v1/ai/cluster — body `{}` or `{"auto_apply": true}`.
pub async fn handle_cluster(
    State(state): State<AppState>,
    Json(request): Json<ClusterRequest>,
) -> Result<Json<ClusterResponse>, AppError> {
    let orchestrator = state.orchestrator();

    let response = if request.auto_apply {
        ClusterResponse::Report(orchestrator.run(&AcceptAll).await?)
    } else {
        ClusterResponse::Prepared(orchestrator.prepare().await?)
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub collections: Vec<CollectionSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub collections_applied: usize,
    pub items_updated: usize,
    /// Post-update state, refreshed from the store.
    pub highlights: Vec<Highlight>,
}

/// POST /api/v1/ai/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<ApplyResponse>, AppError> {
    if request.collections.is_empty() {
        return Err(AppError::Validation("No collections selected.".to_string()));
    }

    let outcome = state.orchestrator().apply(&request.collections).await?;
    Ok(Json(ApplyResponse {
        collections_applied: outcome.collections_applied,
        items_updated: outcome.items_updated,
        highlights: outcome.highlights,
    }))
}
