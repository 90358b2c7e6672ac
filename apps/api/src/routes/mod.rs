pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::clustering::handlers as ai;
use crate::highlights::handlers as highlights;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Highlights
        .route(
            "/api/v1/highlights",
            get(highlights::handle_list).post(highlights::handle_create),
        )
        .route(
            "/api/v1/highlights/:id",
            put(highlights::handle_update).delete(highlights::handle_delete),
        )
        .route("/api/v1/collections", get(highlights::handle_collections))
        // Profile document
        .route("/api/v1/profile/export", get(highlights::handle_export))
        .route("/api/v1/profile/import", post(highlights::handle_import))
        // AI clustering
        .route("/api/v1/ai/availability", get(ai::handle_availability))
        .route("/api/v1/ai/cluster", post(ai::handle_cluster))
        .route("/api/v1/ai/apply", post(ai::handle_apply))
        .with_state(state)
}
