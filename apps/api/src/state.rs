use std::sync::Arc;

use crate::backend::ModelBackend;
use crate::clustering::orchestrator::ClusteringOrchestrator;
use crate::store::HighlightStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HighlightStore>,
    pub backend: Arc<dyn ModelBackend>,
}

impl AppState {
    /// Builds a fresh orchestrator over the shared collaborators. Serializing
    /// runs against the same store is the caller's job — the orchestrator is
    /// reentrant, but concurrent runs race on per-item commits.
    pub fn orchestrator(&self) -> ClusteringOrchestrator {
        ClusteringOrchestrator::new(Arc::clone(&self.store), Arc::clone(&self.backend))
    }
}
