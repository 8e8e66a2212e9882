//! File-backed item storage: one JSON object mapping keys to encoded text.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::DEFAULT_QUOTA_BYTES;
use crate::error::{Error, Result};

use super::lock::with_lock;
use super::ItemStorage;

/// Local-storage style item store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileItemStorage {
    path: PathBuf,
    quota_bytes: usize,
    // Serializes writers within this process; the lock file covers other processes.
    writer: Mutex<()>,
}

impl FileItemStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_quota(path, DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(path: impl Into<PathBuf>, quota_bytes: usize) -> Self {
        Self {
            path: path.into(),
            quota_bytes,
            writer: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn load_for_write(&self) -> HashMap<String, String> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(
                "Discarding unreadable item storage {}: {}",
                self.path.display(),
                e
            );
            HashMap::new()
        })
    }

    fn save(&self, items: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string(items)?;
        if content.len() > self.quota_bytes {
            return Err(Error::QuotaExceeded {
                needed: content.len(),
                quota: self.quota_bytes,
            });
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let _guard = self
            .writer
            .lock()
            .map_err(|_| Error::Storage("item storage writer poisoned".to_string()))?;

        with_lock(&self.path, || {
            let mut items = self.load_for_write();
            f(&mut items);
            self.save(&items)
        })
    }
}

impl ItemStorage for FileItemStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.modify(|items| {
            items.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let storage = FileItemStorage::new(dir.path().join("local.json"));

        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.set_item("a", "\"one\"").unwrap();
        storage.set_item("b", "2").unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("\"one\""));

        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);
        assert_eq!(storage.get_item("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local.json");

        FileItemStorage::new(&path).set_item("k", "true").unwrap();

        let reopened = FileItemStorage::new(&path);
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_quota_rejects_write_and_keeps_old_contents() {
        let dir = TempDir::new().unwrap();
        let storage = FileItemStorage::with_quota(dir.path().join("local.json"), 32);

        storage.set_item("k", "1").unwrap();
        let err = storage.set_item("big", &"x".repeat(64)).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { quota: 32, .. }));

        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.get_item("big").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error_on_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileItemStorage::new(&path);
        assert!(storage.get_item("k").is_err());

        // Writes start over from an empty map.
        storage.set_item("k", "1").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1"));
    }
}
