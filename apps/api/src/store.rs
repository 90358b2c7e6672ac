//! Profile document store.
//!
//! The whole record set lives in one JSON document (a "profile"), mirroring a
//! single-key key-value layout: every mutation is a read-modify-write of the
//! full document. Writes go through a temp file + rename so a crash can never
//! leave a half-written profile on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::highlight::Highlight;

/// The only profile schema this build reads or writes.
pub const PROFILE_SCHEMA: &str = "0.1";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("highlight {0} not found")]
    NotFound(String),

    #[error("invalid profile document: {0}")]
    InvalidProfile(String),
}

/// The persisted document: one profile holding every highlight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub schema: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub highlights: Vec<Highlight>,
}

impl Profile {
    fn empty() -> Self {
        let now = Utc::now();
        Profile {
            id: format!("profile_{}", Uuid::new_v4()),
            schema: PROFILE_SCHEMA.to_string(),
            created_at: now,
            updated_at: now,
            highlights: Vec::new(),
        }
    }
}

/// Persistence collaborator for highlights. The clustering core only ever
/// talks to this trait; `update` is its sole commit path.
#[async_trait]
pub trait HighlightStore: Send + Sync {
    /// All highlights, newest first (document order).
    async fn get_all(&self) -> Result<Vec<Highlight>, StoreError>;

    /// Prepends a new highlight to the document.
    async fn create(&self, highlight: Highlight) -> Result<Highlight, StoreError>;

    /// Upserts by id and stamps `updated_at`.
    async fn update(&self, highlight: Highlight) -> Result<Highlight, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn export_profile(&self) -> Result<Profile, StoreError>;

    /// Replaces the whole document. Rejects documents with an unknown schema.
    async fn import_profile(&self, profile: Profile) -> Result<(), StoreError>;
}

/// File-backed store: the profile is cached in memory behind a mutex and the
/// document is rewritten atomically on every mutation.
pub struct JsonFileStore {
    path: PathBuf,
    profile: Mutex<Profile>,
}

impl JsonFileStore {
    /// Loads the profile from `path`, creating a fresh one (and its parent
    /// directory) if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let profile = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let profile = Profile::empty();
                write_atomic(&path, &profile)?;
                info!("Initialized new profile document at {}", path.display());
                profile
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(JsonFileStore {
            path,
            profile: Mutex::new(profile),
        })
    }

    fn persist(&self, profile: &Profile) -> Result<(), StoreError> {
        write_atomic(&self.path, profile)
    }
}

fn write_atomic(path: &Path, profile: &Profile) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file(), profile)?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl HighlightStore for JsonFileStore {
    async fn get_all(&self) -> Result<Vec<Highlight>, StoreError> {
        Ok(self.profile.lock().await.highlights.clone())
    }

    async fn create(&self, highlight: Highlight) -> Result<Highlight, StoreError> {
        let mut profile = self.profile.lock().await;
        profile.highlights.insert(0, highlight.clone());
        profile.updated_at = Utc::now();
        self.persist(&profile)?;
        debug!(id = %highlight.id, "Highlight created");
        Ok(highlight)
    }

    async fn update(&self, mut highlight: Highlight) -> Result<Highlight, StoreError> {
        let mut profile = self.profile.lock().await;
        highlight.updated_at = Utc::now();

        match profile.highlights.iter_mut().find(|h| h.id == highlight.id) {
            Some(slot) => *slot = highlight.clone(),
            None => profile.highlights.insert(0, highlight.clone()),
        }

        profile.updated_at = Utc::now();
        self.persist(&profile)?;
        Ok(highlight)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut profile = self.profile.lock().await;
        let before = profile.highlights.len();
        profile.highlights.retain(|h| h.id != id);
        if profile.highlights.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        profile.updated_at = Utc::now();
        self.persist(&profile)?;
        Ok(())
    }

    async fn export_profile(&self) -> Result<Profile, StoreError> {
        Ok(self.profile.lock().await.clone())
    }

    async fn import_profile(&self, imported: Profile) -> Result<(), StoreError> {
        if imported.schema != PROFILE_SCHEMA {
            return Err(StoreError::InvalidProfile(format!(
                "unsupported schema '{}', expected '{PROFILE_SCHEMA}'",
                imported.schema
            )));
        }
        if imported.id.trim().is_empty() {
            return Err(StoreError::InvalidProfile("empty profile id".to_string()));
        }

        let mut profile = self.profile.lock().await;
        *profile = imported;
        self.persist(&profile)?;
        info!(highlights = profile.highlights.len(), "Profile imported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("profile.json")).unwrap()
    }

    fn sample(value: &str) -> Highlight {
        Highlight::new(value.into(), "https://example.com".into(), String::new())
    }

    #[tokio::test]
    async fn test_create_prepends_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.create(sample("first")).await.unwrap();
        store.create(sample("second")).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].value, "second");
        assert_eq!(all[1].value, "first");
    }

    #[tokio::test]
    async fn test_update_replaces_by_id_and_restamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut h = store.create(sample("original")).await.unwrap();
        let created_at = h.updated_at;
        h.collections.push("Statistics".to_string());
        let updated = store.update(h.clone()).await.unwrap();

        assert!(updated.updated_at >= created_at);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].collections, vec!["Statistics".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let err = store.delete("pref_missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_profile_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.create(sample("durable")).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, "durable");
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut profile = store.export_profile().await.unwrap();
        profile.schema = "9.9".to_string();
        let err = store.import_profile(profile).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidProfile(_)));
    }

    #[tokio::test]
    async fn test_import_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create(sample("old")).await.unwrap();

        let mut incoming = Profile::empty();
        incoming.highlights.push(sample("imported"));
        store.import_profile(incoming).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, "imported");
    }
}
