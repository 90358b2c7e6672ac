//! Statistics detector — a binary relevance classifier built on the
//! generative backend: one yes/no probe per highlight.

use tracing::{debug, warn};

use crate::backend::ModelSession;
use crate::clustering::prompts::STATISTICS_PROMPT_TEMPLATE;
use crate::models::highlight::Highlight;

/// Longest `value` prefix sent per probe. The full value is never sent.
const PREVIEW_CHARS: usize = 300;

/// A bounded view of one highlight, paired back to its owner's id so a
/// verdict can be projected onto the original record without re-fetching.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub highlight_id: String,
    pub preview: String,
}

impl ClassificationRequest {
    pub fn from_highlight(highlight: &Highlight) -> Self {
        ClassificationRequest {
            highlight_id: highlight.id.clone(),
            preview: highlight.value.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

/// Returns the ids of the highlights the model judged to contain statistical
/// or quantitative content, preserving input order.
///
/// One round trip per item, deliberately unbatched: a failed or garbled reply
/// loses only that item (treated as a negative), never the rest of the run.
/// Empty input returns immediately without touching the session.
pub async fn detect_statistics(
    session: &mut dyn ModelSession,
    items: &[Highlight],
) -> Vec<String> {
    if items.is_empty() {
        return Vec::new();
    }

    let mut flagged = Vec::new();
    for request in items.iter().map(ClassificationRequest::from_highlight) {
        let prompt = STATISTICS_PROMPT_TEMPLATE.replace("{preview}", &request.preview);

        match session.prompt(&prompt).await {
            Ok(reply) => {
                if is_affirmative(&reply) {
                    debug!(highlight_id = %request.highlight_id, "Statistics detected");
                    flagged.push(request.highlight_id);
                }
            }
            Err(e) => {
                // Skip-and-continue: a transient backend failure must never
                // abort the batch.
                warn!(
                    highlight_id = %request.highlight_id,
                    "Classification call failed, treating as negative: {e}"
                );
            }
        }
    }
    flagged
}

/// Anything other than a reply containing "yes" counts as a negative —
/// including "no", empty, and garbled output.
fn is_affirmative(reply: &str) -> bool {
    reply.trim().to_lowercase().contains("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stub::StubSession;

    fn highlight(value: &str) -> Highlight {
        Highlight::new(value.into(), "https://example.com".into(), String::new())
    }

    #[test]
    fn test_is_affirmative_normalization() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("  YES.  "));
        assert!(is_affirmative("Yes, it does."));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("Not sure"));
    }

    #[test]
    fn test_preview_is_bounded_and_char_safe() {
        let long = "é".repeat(500);
        let request = ClassificationRequest::from_highlight(&highlight(&long));
        assert_eq!(request.preview.chars().count(), 300);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_backend_call() {
        let mut session = StubSession::with_replies(vec![]);
        let flagged = detect_statistics(&mut session, &[]).await;
        assert!(flagged.is_empty());
        assert_eq!(session.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_output_is_an_ordered_subsequence_of_input() {
        let items = vec![
            highlight("crime fell 40% last year"),
            highlight("a poem about rivers"),
            highlight("GDP grew by 2.1%"),
            highlight("recipe for bread"),
        ];
        let mut session = StubSession::with_replies(vec![
            Ok("yes".to_string()),
            Ok("no".to_string()),
            Ok("Yes, it does.".to_string()),
            Ok("no".to_string()),
        ]);

        let flagged = detect_statistics(&mut session, &items).await;

        assert_eq!(flagged, vec![items[0].id.clone(), items[2].id.clone()]);
        assert_eq!(session.prompt_count(), 4);
    }

    #[tokio::test]
    async fn test_failed_item_is_skipped_not_fatal() {
        let items = vec![highlight("a"), highlight("b"), highlight("c")];
        let mut session = StubSession::with_replies(vec![
            Ok("yes".to_string()),
            Err("backend hiccup".to_string()),
            Ok("yes".to_string()),
        ]);

        let flagged = detect_statistics(&mut session, &items).await;

        assert_eq!(flagged, vec![items[0].id.clone(), items[2].id.clone()]);
    }

    #[tokio::test]
    async fn test_garbled_reply_is_a_negative() {
        let items = vec![highlight("a")];
        let mut session = StubSession::with_replies(vec![Ok("?!#@".to_string())]);

        let flagged = detect_statistics(&mut session, &items).await;
        assert!(flagged.is_empty());
    }
}
