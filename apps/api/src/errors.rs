use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::clustering::ClusterError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("Highlight {id} not found")),
            StoreError::InvalidProfile(msg) => {
                AppError::Validation(format!("Invalid profile document: {msg}"))
            }
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Cluster(e) => cluster_response(e),
            AppError::Store(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
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
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn cluster_response(e: &ClusterError) -> (StatusCode, &'static str, String) {
    match e {
        // The reason reaches the user verbatim.
        ClusterError::BackendUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "AI_UNAVAILABLE",
            e.to_string(),
        ),
        ClusterError::NoItems | ClusterError::InsufficientItems { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "PRECONDITION_FAILED",
            e.to_string(),
        ),
        ClusterError::ModelInvocation(source) => {
            tracing::error!("Model invocation failed: {source}");
            (
                StatusCode::BAD_GATEWAY,
                "MODEL_ERROR",
                "The AI model call failed".to_string(),
            )
        }
        ClusterError::MalformedResponse { raw } => {
            tracing::error!(raw = %raw, "Model returned malformed output");
            (
                StatusCode::BAD_GATEWAY,
                "MALFORMED_MODEL_OUTPUT",
                e.to_string(),
            )
        }
        ClusterError::Store(source) => {
            tracing::error!("Storage error during clustering: {source}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "A storage error occurred".to_string(),
            )
        }
    }
}
