//! # Transcript Store
//!
//! Persists finished transcripts as pretty-printed JSON, one file per store
//! call, under a configured directory.
//!
//! Filenames combine the sanitized conversation id with a second-granularity
//! timestamp. Two stores for the same id within the same second write the same
//! path and the later one wins; there is no locking and no atomic rename.

use crate::error::{self, Error, Result};
use crate::transcript::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "conversation_";

/// On-disk record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTranscript {
    pub conversation_id: String,
    pub personality_name: String,
    pub messages: Vec<Message>,
    pub stored_at: DateTime<Utc>,
}

/// Result of a store call. Failure is reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreOutcome {
    pub success: bool,
    /// Empty when `success` is false
    pub filepath: String,
}

impl StoreOutcome {
    fn failed() -> Self {
        Self {
            success: false,
            filepath: String::new(),
        }
    }
}

/// Replace characters that are unsafe in a filename
pub fn sanitize_id(id: &str) -> String {
    id.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' ', '.'], "_")
}

/// File-based transcript storage
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    base_path: PathBuf,
}

impl TranscriptStore {
    /// Open a store, creating its directory if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            error::io_error(format!("Failed to create storage dir: {}", e))
                .with_operation("store::new")
                .with_context("path", base_path.display().to_string())
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, conversation_id: &str, at: DateTime<Utc>) -> PathBuf {
        self.base_path.join(format!(
            "{}{}_{}.json",
            FILE_PREFIX,
            sanitize_id(conversation_id),
            at.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Store a transcript stamped with the current time
    pub fn store(&self, conversation_id: &str, personality_name: &str, messages: &[Message]) -> StoreOutcome {
        self.store_at(conversation_id, personality_name, messages, Utc::now())
    }

    /// Store a transcript stamped with `at`
    pub fn store_at(
        &self,
        conversation_id: &str,
        personality_name: &str,
        messages: &[Message],
        at: DateTime<Utc>,
    ) -> StoreOutcome {
        let record = StoredTranscript {
            conversation_id: conversation_id.to_string(),
            personality_name: personality_name.to_string(),
            messages: messages.to_vec(),
            stored_at: at,
        };
        let path = self.record_path(conversation_id, at);

        match write_record(&path, &record) {
            Ok(()) => {
                tracing::info!("Stored conversation {} at {}", conversation_id, path.display());
                StoreOutcome {
                    success: true,
                    filepath: path.display().to_string(),
                }
            }
            Err(e) => {
                tracing::error!("Failed to store conversation {}: {}", conversation_id, e);
                StoreOutcome::failed()
            }
        }
    }

    /// Read a stored record back
    pub fn load(&self, path: impl AsRef<Path>) -> Result<StoredTranscript> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("store::load")
                .with_context("path", path.display().to_string())
        })?;
        serde_json::from_str(&content).map_err(|e| error::json_parse("stored transcript", e))
    }

    /// Paths of every stored transcript, oldest name first
    pub fn list(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.base_path)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|path| {
                        let is_json = path.extension().map(|ext| ext == "json").unwrap_or(false);
                        let is_record = path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with(FILE_PREFIX))
                            .unwrap_or(false);
                        is_json && is_record
                    })
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

fn write_record(path: &Path, record: &StoredTranscript) -> Result<()> {
    let content = serde_json::to_string_pretty(record)
        .map_err(|e| error::serialization_error(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| {
        Error::storage_failed(format!("Failed to write {}: {}", path.display(), e))
            .with_operation("store::write")
            .set_source(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn messages() -> Vec<Message> {
        vec![Message::user("Swap 1 ETH"), Message::agent("Done.")]
    }

    #[test]
    fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let outcome = store.store_at("conv-1", "DeFiNewbie", &messages(), at);
        assert!(outcome.success);
        assert!(outcome.filepath.ends_with("conversation_conv-1_20250304_050607.json"));

        let record = store.load(&outcome.filepath).unwrap();
        assert_eq!(record.conversation_id, "conv-1");
        assert_eq!(record.personality_name, "DeFiNewbie");
        assert_eq!(record.messages, messages());
        assert_eq!(record.stored_at, at);
    }

    #[test]
    fn test_record_field_names() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        let outcome = store.store("c", "p", &messages());

        let raw = std::fs::read_to_string(&outcome.filepath).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["conversation_id", "personality_name", "messages", "stored_at"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(raw.contains('\n'));
    }

    #[test]
    fn test_unsafe_ids_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();

        let outcome = store.store("../../etc/passwd", "p", &messages());
        assert!(outcome.success);
        let path = PathBuf::from(&outcome.filepath);
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(!path.file_name().unwrap().to_str().unwrap().contains('/'));
    }

    #[test]
    fn test_same_second_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let first = store.store_at("dup", "A", &messages(), at);
        let second = store.store_at("dup", "B", &messages()[..1], at);
        assert_eq!(first.filepath, second.filepath);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.load(&second.filepath).unwrap().personality_name, "B");

        let later = store.store_at("dup", "C", &messages(), at + chrono::Duration::seconds(1));
        assert_ne!(later.filepath, first.filepath);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_list_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("test_results_1.json"), "{}").unwrap();
        store.store("c", "p", &messages());

        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_write_failure_reports_false() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path().join("gone")).unwrap();
        std::fs::remove_dir(store.base_path()).unwrap();

        let outcome = store.store("c", "p", &messages());
        assert!(!outcome.success);
        assert!(outcome.filepath.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        let err = store.load(dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FileNotFound);
    }
}
