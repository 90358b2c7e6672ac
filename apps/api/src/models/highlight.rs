use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-captured text snippet with provenance, labels, and notes.
///
/// `value` is immutable after capture from the system's point of view —
/// every change flows through the store's `update`, which re-stamps
/// `updated_at`. Only the user deletes a highlight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    pub value: String,
    pub source_url: String,
    pub collections: Vec<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Highlight {
    pub fn new(value: String, source_url: String, notes: String) -> Self {
        let now = Utc::now();
        Highlight {
            id: format!("pref_{}", Uuid::new_v4()),
            value,
            source_url,
            collections: Vec::new(),
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.iter().any(|c| c == name)
    }

    /// Appends `name` to the label set unless already present.
    /// Returns true if the label was added. Dedup is the producer's job —
    /// storage keeps whatever sequence it is handed.
    pub fn add_collection(&mut self, name: &str) -> bool {
        if self.has_collection(name) {
            return false;
        }
        self.collections.push(name.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_highlight_has_prefixed_id_and_no_labels() {
        let h = Highlight::new("text".into(), "https://example.com".into(), String::new());
        assert!(h.id.starts_with("pref_"));
        assert!(h.collections.is_empty());
        assert_eq!(h.created_at, h.updated_at);
    }

    #[test]
    fn test_add_collection_is_idempotent() {
        let mut h = Highlight::new("text".into(), "https://example.com".into(), String::new());
        assert!(h.add_collection("Statistics"));
        assert!(!h.add_collection("Statistics"));
        assert_eq!(h.collections, vec!["Statistics".to_string()]);
    }

    #[test]
    fn test_highlight_round_trips_through_json() {
        let h = Highlight::new("50% of readers".into(), "https://news.example".into(), "note".into());
        let json = serde_json::to_string(&h).unwrap();
        let back: Highlight = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, h.id);
        assert_eq!(back.value, h.value);
        assert_eq!(back.source_url, h.source_url);
    }
}
