//! Parses raw model output into validated collection suggestions.
//!
//! The backend is a free-text generator, not a structured API, so every step
//! is defensive: fences stripped, the object span extracted greedily, the
//! JSON shape checked, and hallucinated item indices dropped rather than
//! trusted. Structural validity is enforced here; content quality (empty
//! names, vague descriptions) deliberately is not.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clustering::{ClusterError, CollectionSuggestion};
use crate::models::highlight::Highlight;

#[derive(Debug, Deserialize)]
struct RawClusterReply {
    collections: Vec<RawCollection>,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    // Kept as raw values: a non-integer index is the model's mistake, and must
    // degrade to a dropped index, not a failed parse.
    #[serde(default, rename = "itemIndices")]
    item_indices: Vec<Value>,
}

/// Extracts the suggestion set from `raw`, resolving item indices against
/// `items` by zero-based position.
///
/// Out-of-range and non-integer indices are dropped silently; a collection
/// whose indices all fail to resolve is dropped with them. Surviving
/// collections keep the model's emission order.
pub fn parse_cluster_reply(
    raw: &str,
    items: &[Highlight],
) -> Result<Vec<CollectionSuggestion>, ClusterError> {
    let text = strip_code_fences(raw.trim());
    let candidate = extract_object_span(&text).ok_or_else(|| malformed(raw))?;

    let reply: RawClusterReply = serde_json::from_str(candidate).map_err(|e| {
        warn!("Cluster reply failed JSON validation: {e}");
        malformed(raw)
    })?;

    let mut suggestions = Vec::new();
    for collection in reply.collections {
        let item_ids = resolve_indices(&collection.item_indices, items);
        if item_ids.is_empty() {
            debug!(name = %collection.name, "Dropping suggestion with no resolvable items");
            continue;
        }
        suggestions.push(CollectionSuggestion {
            name: collection.name,
            description: collection.description,
            item_ids,
        });
    }
    Ok(suggestions)
}

/// Removes markdown fence markers (with or without a language tag) wherever
/// they occur, leaving the fenced content in place.
fn strip_code_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.replace("```json", "").replace("```", "")
}

/// Greedy object span: first `{` through last `}`. Tolerates commentary the
/// model adds around the JSON despite instructions.
fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn resolve_indices(indices: &[Value], items: &[Highlight]) -> Vec<String> {
    let mut ids = Vec::new();
    for value in indices {
        let Some(index) = value.as_u64() else {
            debug!(index = %value, "Dropping non-integer item index");
            continue;
        };
        match items.get(index as usize) {
            Some(item) => ids.push(item.id.clone()),
            None => debug!(index, "Dropping out-of-range item index"),
        }
    }
    ids
}

fn malformed(raw: &str) -> ClusterError {
    ClusterError::MalformedResponse {
        raw: raw.to_string(),
    }
}
