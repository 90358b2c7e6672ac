//! Clustering orchestrator — drives one user-triggered run end to end.
//!
//! Phases: CheckingAvailability → TaggingStatistics → Clustering →
//! AwaitingUserReview → Applying. Preconditions are checked before the
//! machine starts, an unavailable backend aborts before any mutation, and the
//! model session is acquired once per run and released on every exit path.
//!
//! Callers must serialize runs against the same store — the orchestrator
//! itself is reentrant, but per-item commits are read-modify-write with no
//! cross-item transaction (last-write-wins).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{ModelBackend, ModelSession, SessionOptions};
use crate::clustering::classifier::detect_statistics;
use crate::clustering::clusterer::cluster_highlights;
use crate::clustering::{
    ClusterError, CollectionSuggestion, MIN_ITEMS_FOR_CLUSTERING, STATISTICS_COLLECTION,
};
use crate::models::highlight::Highlight;
use crate::store::HighlightStore;

/// Review-step collaborator. Shown every suggestion pre-selected; returns the
/// accepted subset, or `None` when the user cancels — a cancelled review
/// applies zero changes.
#[async_trait]
pub trait SuggestionReviewer: Send + Sync {
    async fn review(
        &self,
        suggestions: &[CollectionSuggestion],
    ) -> Option<Vec<CollectionSuggestion>>;
}

/// Accepts every suggestion as presented.
pub struct AcceptAll;

#[async_trait]
impl SuggestionReviewer for AcceptAll {
    async fn review(
        &self,
        suggestions: &[CollectionSuggestion],
    ) -> Option<Vec<CollectionSuggestion>> {
        Some(suggestions.to_vec())
    }
}

/// Everything a run produces before the review step.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedRun {
    /// Highlights that gained the statistics label this run (committed).
    pub stats_tagged: usize,
    pub suggestions: Vec<CollectionSuggestion>,
}

/// Outcome of applying accepted suggestions.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub collections_applied: usize,
    /// Items that actually changed — an item already bearing all its
    /// would-be labels contributes zero.
    pub items_updated: usize,
    /// Authoritative post-update state, refreshed from the store.
    pub highlights: Vec<Highlight>,
}

/// Report for a full run (prepare → review → apply).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats_tagged: usize,
    pub suggestions: Vec<CollectionSuggestion>,
    pub cancelled: bool,
    pub collections_applied: usize,
    pub items_updated: usize,
}

pub struct ClusteringOrchestrator {
    store: Arc<dyn HighlightStore>,
    backend: Arc<dyn ModelBackend>,
}

impl ClusteringOrchestrator {
    pub fn new(store: Arc<dyn HighlightStore>, backend: Arc<dyn ModelBackend>) -> Self {
        ClusteringOrchestrator { store, backend }
    }

    /// Preconditions → availability → statistics tagging → clustering.
    ///
    /// Returns the tagging count and the suggestion set for review. An empty
    /// suggestion set is success, not failure — statistics tagging and
    /// semantic clustering are independently valuable.
    pub async fn prepare(&self) -> Result<PreparedRun, ClusterError> {
        let mut items = self.store.get_all().await?;

        if items.is_empty() {
            return Err(ClusterError::NoItems);
        }
        if items.len() < MIN_ITEMS_FOR_CLUSTERING {
            return Err(ClusterError::InsufficientItems {
                found: items.len(),
            });
        }

        info!(
            phase = "checking_availability",
            items = items.len(),
            "Clustering run started"
        );
        let availability = self.backend.availability().await;
        if let Some(reason) = availability.blocking_reason() {
            warn!(phase = "checking_availability", %reason, "Aborting run");
            return Err(ClusterError::BackendUnavailable(reason));
        }

        let mut session = self
            .backend
            .create_session(SessionOptions::default())
            .await
            .map_err(ClusterError::ModelInvocation)?;

        // The fallible body runs first so the release below is reached on
        // every exit path, success or error.
        let outcome = self.tag_and_cluster(session.as_mut(), &mut items).await;
        session.release().await;
        let (stats_tagged, suggestions) = outcome?;

        Ok(PreparedRun {
            stats_tagged,
            suggestions,
        })
    }

    async fn tag_and_cluster(
        &self,
        session: &mut dyn ModelSession,
        items: &mut [Highlight],
    ) -> Result<(usize, Vec<CollectionSuggestion>), ClusterError> {
        // Items already labeled are skipped; only the rest go to the model.
        let unlabeled: Vec<Highlight> = items
            .iter()
            .filter(|h| !h.has_collection(STATISTICS_COLLECTION))
            .cloned()
            .collect();
        info!(
            phase = "tagging_statistics",
            unlabeled = unlabeled.len(),
            total = items.len(),
            "Partitioned working set"
        );

        let flagged = detect_statistics(session, &unlabeled).await;

        let mut stats_tagged = 0usize;
        for id in &flagged {
            let Some(item) = items.iter_mut().find(|h| &h.id == id) else {
                continue;
            };
            if !item.add_collection(STATISTICS_COLLECTION) {
                continue;
            }
            match self.store.update(item.clone()).await {
                Ok(updated) => {
                    *item = updated;
                    stats_tagged += 1;
                }
                // Not retried, not counted, not fatal to the rest.
                Err(e) => warn!(highlight_id = %id, "Failed to commit statistics label: {e}"),
            }
        }
        info!(
            phase = "tagging_statistics",
            flagged = flagged.len(),
            tagged = stats_tagged,
            "Statistics tagging complete"
        );

        // The clusterer sees the entire working set, freshly tagged items
        // included.
        info!(phase = "clustering", items = items.len(), "Clustering working set");
        let suggestions = cluster_highlights(session, items).await?;
        Ok((stats_tagged, suggestions))
    }

    /// Applies accepted suggestions: appends each collection's name to its
    /// items' labels (skipping labels already present), committing per item,
    /// then refreshes the working set from the store.
    ///
    /// Re-applying an already-applied set is a true no-op: `items_updated` 0.
    pub async fn apply(
        &self,
        accepted: &[CollectionSuggestion],
    ) -> Result<ApplyOutcome, ClusterError> {
        info!(
            phase = "applying",
            collections = accepted.len(),
            "Applying accepted suggestions"
        );
        let mut items = self.store.get_all().await?;

        let mut collections_applied = 0usize;
        let mut items_updated = 0usize;
        for suggestion in accepted {
            let name = suggestion.name.trim();
            if name.is_empty() {
                // A label must be non-empty once displayed as a tag.
                warn!("Skipping suggestion with an empty name");
                continue;
            }
            collections_applied += 1;

            for id in &suggestion.item_ids {
                let Some(item) = items.iter_mut().find(|h| &h.id == id) else {
                    debug!(highlight_id = %id, "Suggested item no longer exists");
                    continue;
                };
                if !item.add_collection(name) {
                    continue;
                }
                match self.store.update(item.clone()).await {
                    Ok(updated) => {
                        *item = updated;
                        items_updated += 1;
                    }
                    Err(e) => warn!(highlight_id = %id, "Failed to commit collection label: {e}"),
                }
            }
        }

        let highlights = self.store.get_all().await?;
        info!(phase = "applying", items_updated, "Apply complete");
        Ok(ApplyOutcome {
            collections_applied,
            items_updated,
            highlights,
        })
    }

    /// Full run: prepare → review → apply.
    pub async fn run(&self, reviewer: &dyn SuggestionReviewer) -> Result<RunReport, ClusterError> {
        let prepared = self.prepare().await?;

        if prepared.suggestions.is_empty() {
            // Still a successful run — the tagging outcome is reported.
            info!(
                stats_tagged = prepared.stats_tagged,
                "No suggestions to review; run complete"
            );
            return Ok(RunReport {
                stats_tagged: prepared.stats_tagged,
                suggestions: Vec::new(),
                cancelled: false,
                collections_applied: 0,
                items_updated: 0,
            });
        }

        info!(
            phase = "awaiting_user_review",
            suggestions = prepared.suggestions.len(),
            "Presenting suggestions"
        );
        let Some(accepted) = reviewer.review(&prepared.suggestions).await else {
            info!(phase = "awaiting_user_review", "Review cancelled; nothing applied");
            return Ok(RunReport {
                stats_tagged: prepared.stats_tagged,
                suggestions: prepared.suggestions,
                cancelled: true,
                collections_applied: 0,
                items_updated: 0,
            });
        };

        let outcome = self.apply(&accepted).await?;
        Ok(RunReport {
            stats_tagged: prepared.stats_tagged,
            suggestions: prepared.suggestions,
            cancelled: false,
            collections_applied: outcome.collections_applied,
            items_updated: outcome.items_updated,
        })
    }
}
