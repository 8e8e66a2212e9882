//! Backend over a synchronous item store; values are kept as JSON text.

use serde_json::Value;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::host::ItemStorage;

use super::backend::{present, Backend, BackendKind, OnGet};

/// Key written and removed to check that item storage actually works.
pub const PROBE_KEY: &str = "__pref_storage_test__";

pub struct LocalBackend {
    storage: Arc<dyn ItemStorage>,
}

impl LocalBackend {
    /// Wrap `storage` after a write/remove round trip succeeds on it.
    pub fn probe(storage: Arc<dyn ItemStorage>) -> Result<Self> {
        storage.set_item(PROBE_KEY, "test")?;
        storage.remove_item(PROBE_KEY)?;
        Ok(Self { storage })
    }

    fn read(&self, key: &str) -> Option<Value> {
        match self.storage.get_item(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Ignoring undecodable value under {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Item storage read failed for {}: {}", key, e);
                None
            }
        }
    }
}

impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn get(&self, key: String, on_get: OnGet) {
        on_get(present(self.read(&key)));
    }

    fn set(&self, key: String, value: Value) {
        let result = serde_json::to_string(&value)
            .map_err(Error::from)
            .and_then(|encoded| self.storage.set_item(&key, &encoded));
        if let Err(e) = result {
            tracing::warn!("Failed to save to local storage: {}", e);
        }
    }

    fn remove(&self, key: String) {
        if let Err(e) = self.storage.remove_item(&key) {
            tracing::warn!("Failed to remove {} from local storage: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapItems {
        items: Mutex<HashMap<String, String>>,
        reject_writes: bool,
    }

    impl ItemStorage for MapItems {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            Ok(self.items.lock().unwrap().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            if self.reject_writes {
                return Err(Error::QuotaExceeded { needed: value.len(), quota: 0 });
            }
            self.items
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.items.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn read(backend: &LocalBackend, key: &str) -> Option<Value> {
        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        backend.get(key.to_string(), Box::new(move |v| *sink.lock().unwrap() = Some(v)));
        let result = slot.lock().unwrap().take();
        result.expect("local backend completes synchronously")
    }

    #[test]
    fn test_probe_leaves_no_sentinel() {
        let items = Arc::new(MapItems::default());
        LocalBackend::probe(items.clone()).unwrap();
        assert!(items.items.lock().unwrap().is_empty());
    }

    #[test]
    fn test_probe_fails_when_writes_rejected() {
        let items = Arc::new(MapItems {
            reject_writes: true,
            ..Default::default()
        });
        assert!(LocalBackend::probe(items).is_err());
    }

    #[test]
    fn test_values_are_stored_as_json_text() {
        let items = Arc::new(MapItems::default());
        let backend = LocalBackend::probe(items.clone()).unwrap();

        backend.set("k".to_string(), json!({"a": [1, "two"]}));
        assert_eq!(
            items.items.lock().unwrap().get("k").map(String::as_str),
            Some(r#"{"a":[1,"two"]}"#)
        );
        assert_eq!(read(&backend, "k"), Some(json!({"a": [1, "two"]})));
    }

    #[test]
    fn test_corrupt_text_reads_as_none() {
        let items = Arc::new(MapItems::default());
        let backend = LocalBackend::probe(items.clone()).unwrap();

        items
            .items
            .lock()
            .unwrap()
            .insert("k".to_string(), "{oops".to_string());
        assert_eq!(read(&backend, "k"), None);
    }
}
