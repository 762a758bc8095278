//! Process-wide key/value state store
//!
//! The trust decision outlives a single verification call: it is written under
//! [`BEYOND_CORP_KEY`] as `"True"` or `"False"` and read by later provisioning
//! steps. Keys are case-insensitive.

use crate::error::ErrorKind;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Key holding the trust decision
pub const BEYOND_CORP_KEY: &str = "beyond_corp";

/// State store failures
#[derive(Error, Debug)]
pub enum StateStoreError {
    /// Reading a value failed
    #[error("failed to read state value {key}: {reason}")]
    Read {
        /// Key being read
        key: String,
        /// Backend description
        reason: String,
    },

    /// Writing a value failed
    #[error("failed to write state value {key}: {reason}")]
    Write {
        /// Key being written
        key: String,
        /// Backend description
        reason: String,
    },

    /// Backing file I/O failed
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file is not valid JSON
    #[error("state file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StateStoreError {
    /// Taxonomy kind, always [`ErrorKind::StateStore`]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StateStore
    }
}

/// Case-insensitive string key/value persistence
pub trait StateStore: Send + Sync {
    /// Read `key`, `None` when unset
    fn get_value(&self, key: &str) -> Result<Option<String>, StateStoreError>;

    /// Write `key`
    fn set_value(&self, key: &str, value: &str) -> Result<(), StateStoreError>;
}

fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

/// Merge keys that differ only by case
///
/// A key already in normalized form wins over its other-case spellings;
/// among those, the first in sorted order is kept.
fn fold_keys(raw: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut folded = BTreeMap::new();
    for (key, value) in raw {
        let normalized = normalize_key(&key);
        if normalized == key {
            folded.insert(normalized, value);
        } else {
            folded.entry(normalized).or_insert(value);
        }
    }
    folded
}

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one value
    pub fn with_value(self, key: &str, value: impl Into<String>) -> Self {
        self.values.lock().insert(normalize_key(key), value.into());
        self
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Whether no key is stored
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get_value(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        Ok(self.values.lock().get(&normalize_key(key)).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        self.values
            .lock()
            .insert(normalize_key(key), value.to_string());
        Ok(())
    }
}

/// State store persisted as a JSON object on disk
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    /// Open a store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StateStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => {
                let raw: BTreeMap<String, String> = serde_json::from_str(&content)?;
                Ok(fold_keys(raw))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StateStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, serde_json::to_string_pretty(values)?)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get_value(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        let _guard = self.lock.lock();
        let values = self.read_all().map_err(|e| StateStoreError::Read {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(values.get(&normalize_key(key)).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        let _guard = self.lock.lock();
        let write_err = |e: StateStoreError| StateStoreError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let mut values = self.read_all().map_err(write_err)?;
        values.insert(normalize_key(key), value.to_string());
        self.write_all(&values).map_err(write_err)?;

        debug!(path = %self.path.display(), key, value, "Persisted state value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_case_insensitive() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStateStore::new();
        store.set_value("Beyond_Corp", "True")?;
        assert_eq!(store.get_value(BEYOND_CORP_KEY)?.as_deref(), Some("True"));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn test_memory_store_unset() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStateStore::new();
        assert_eq!(store.get_value(BEYOND_CORP_KEY)?, None);
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_file_store_persists() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state").join("imaging.json");

        FileStateStore::new(&path).set_value(BEYOND_CORP_KEY, "False")?;

        let reopened = FileStateStore::new(&path);
        assert_eq!(reopened.get_value("BEYOND_CORP")?.as_deref(), Some("False"));
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn test_file_store_missing_file_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileStateStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get_value(BEYOND_CORP_KEY)?, None);
        Ok(())
    }

    #[test]
    fn test_file_store_corrupt_read() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json")?;

        let store = FileStateStore::new(&path);
        assert!(matches!(
            store.get_value(BEYOND_CORP_KEY),
            Err(StateStoreError::Read { .. })
        ));
        assert!(matches!(
            store.set_value(BEYOND_CORP_KEY, "True"),
            Err(StateStoreError::Write { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_file_store_finds_foreign_case_keys() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"Beyond_Corp": "True"}"#)?;

        let store = FileStateStore::new(&path);
        assert_eq!(store.get_value(BEYOND_CORP_KEY)?.as_deref(), Some("True"));
        Ok(())
    }

    #[test]
    fn test_file_store_write_drops_case_duplicates() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"Beyond_Corp": "True", "IMAGE_ID": "1234"}"#)?;

        FileStateStore::new(&path).set_value(BEYOND_CORP_KEY, "False")?;

        let on_disk: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        let expected: BTreeMap<String, String> = [
            ("beyond_corp".to_string(), "False".to_string()),
            ("image_id".to_string(), "1234".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(on_disk, expected);
        Ok(())
    }

    #[test]
    fn test_fold_keys_prefers_normalized_spelling() {
        let raw: BTreeMap<String, String> = [
            ("BEYOND_CORP".to_string(), "False".to_string()),
            ("beyond_corp".to_string(), "True".to_string()),
        ]
        .into_iter()
        .collect();
        let folded = fold_keys(raw);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded.get(BEYOND_CORP_KEY).map(String::as_str), Some("True"));
    }

    #[test]
    fn test_file_store_keeps_other_keys() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileStateStore::new(dir.path().join("state.json"));
        store.set_value("image_id", "1234")?;
        store.set_value(BEYOND_CORP_KEY, "True")?;
        assert_eq!(store.get_value("image_id")?.as_deref(), Some("1234"));
        Ok(())
    }
}
