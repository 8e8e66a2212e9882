//! Process-local fallback backend.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::backend::{present, Backend, BackendKind, OnGet};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        // A panic elsewhere cannot leave a HashMap half-written, so keep going.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn get(&self, key: String, on_get: OnGet) {
        let value = self.entries().get(&key).cloned();
        on_get(present(value));
    }

    fn set(&self, key: String, value: Value) {
        self.entries().insert(key, value);
    }

    fn remove(&self, key: String) {
        self.entries().remove(&key);
    }
}
