//! Semantic clusterer — groups the whole working set in one batched call.

use tracing::{debug, info};

use crate::backend::ModelSession;
use crate::clustering::parser::parse_cluster_reply;
use crate::clustering::prompts::CLUSTER_PROMPT_TEMPLATE;
use crate::clustering::{ClusterError, CollectionSuggestion};
use crate::models::highlight::Highlight;

/// Per-snippet preview length inside the batched prompt.
const SNIPPET_CHARS: usize = 200;

/// Asks the model to group `items` into named collections.
///
/// Exactly one round trip for the whole batch — clustering needs joint
/// knowledge of every item and cannot be decomposed per item the way
/// classification can, so a failed call fails the whole step
/// (`ModelInvocation`) and a malformed reply propagates from the parser
/// unchanged.
pub async fn cluster_highlights(
    session: &mut dyn ModelSession,
    items: &[Highlight],
) -> Result<Vec<CollectionSuggestion>, ClusterError> {
    if items.is_empty() {
        return Err(ClusterError::NoItems);
    }

    let prompt = CLUSTER_PROMPT_TEMPLATE.replace("{snippets}", &render_snippets(items));
    debug!(items = items.len(), "Requesting semantic clustering");

    let reply = session
        .prompt(&prompt)
        .await
        .map_err(ClusterError::ModelInvocation)?;

    let suggestions = parse_cluster_reply(&reply, items)?;
    info!(suggestions = suggestions.len(), "Clustering reply parsed");
    Ok(suggestions)
}

/// Renders each item as `[index] <preview>` with embedded newlines collapsed,
/// joined by blank lines. The zero-based position is the sole join key the
/// parser resolves against.
fn render_snippets(items: &[Highlight]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let preview: String = item.value.chars().take(SNIPPET_CHARS).collect();
            format!("[{index}] {}", preview.replace('\n', " "))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stub::StubSession;

    fn highlight(value: &str) -> Highlight {
        Highlight::new(value.into(), "https://example.com".into(), String::new())
    }

    #[test]
    fn test_render_snippets_indexes_and_collapses_newlines() {
        let items = vec![highlight("line one\nline two"), highlight("second")];
        let rendered = render_snippets(&items);
        assert_eq!(rendered, "[0] line one line two\n\n[1] second");
    }

    #[test]
    fn test_render_snippets_truncates_long_values() {
        let items = vec![highlight(&"x".repeat(500))];
        let rendered = render_snippets(&items);
        assert_eq!(rendered.len(), "[0] ".len() + 200);
    }

    #[tokio::test]
    async fn test_empty_input_is_no_items_without_backend_call() {
        let mut session = StubSession::with_replies(vec![]);
        let err = cluster_highlights(&mut session, &[]).await.unwrap_err();
        assert!(matches!(err, ClusterError::NoItems));
        assert_eq!(session.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_fails_the_whole_step() {
        let items = vec![highlight("a"), highlight("b")];
        let mut session = StubSession::with_replies(vec![Err("boom".to_string())]);

        let err = cluster_highlights(&mut session, &items).await.unwrap_err();
        assert!(matches!(err, ClusterError::ModelInvocation(_)));
    }

    #[tokio::test]
    async fn test_happy_path_resolves_ids() {
        let items = vec![highlight("a"), highlight("b"), highlight("c")];
        let reply = r#"{"collections":[{"name":"Letters","description":"single letters","itemIndices":[0,1,2]}]}"#;
        let mut session = StubSession::with_replies(vec![Ok(reply.to_string())]);

        let suggestions = cluster_highlights(&mut session, &items).await.unwrap();

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "Letters");
        assert_eq!(
            suggestions[0].item_ids,
            items.iter().map(|h| h.id.clone()).collect::<Vec<_>>()
        );
    }
}
