//! AI-assisted clustering and annotation pipeline.
//!
//! Flow: availability check → statistics tagging (per-item classifier) →
//! semantic clustering (one batched call) → user review → application of the
//! accepted suggestions to the stored highlights.

pub mod classifier;
pub mod clusterer;
pub mod handlers;
pub mod orchestrator;
pub mod parser;
pub mod prompts;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;

/// Label the statistics detector appends to flagged highlights.
pub const STATISTICS_COLLECTION: &str = "Statistics";

/// Below this many highlights, clustering quality is ineffective.
pub const MIN_ITEMS_FOR_CLUSTERING: usize = 3;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The backend cannot serve a run; the reason is surfaced to the user
    /// verbatim. Nothing has been mutated when this is raised.
    #[error("{0}")]
    BackendUnavailable(String),

    #[error("No highlights to cluster. Save some highlights first.")]
    NoItems,

    #[error("You need at least 3 highlights for AI clustering to work effectively (found {found}).")]
    InsufficientItems { found: usize },

    /// A single backend round trip failed. Fatal for the batched clustering
    /// call; the per-item classifier swallows these instead.
    #[error("model call failed: {0}")]
    ModelInvocation(#[source] BackendError),

    /// The model's output could not be parsed into the expected structure.
    /// Carries the raw text for diagnostics; never retried automatically.
    #[error("the model returned invalid structured output")]
    MalformedResponse { raw: String },

    /// The working set could not be read. Per-item commit failures are NOT
    /// this error — they only reduce the reported success count.
    #[error("storage error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// A proposed grouping pending user acceptance. Items are referenced by
/// highlight id — never by copied value — so previews always reflect the live
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSuggestion {
    pub name: String,
    pub description: String,
    pub item_ids: Vec<String>,
}
