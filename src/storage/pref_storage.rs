//! Prefixed preference store over whichever backend the host supports.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::host::Host;

use super::backend::{Backend, BackendKind, OnGet};
use super::extension::ExtensionBackend;
use super::local::LocalBackend;
use super::memory::MemoryBackend;

/// A key/value store for JSON values with an optional key prefix.
///
/// The backend is chosen once, in [`PrefStorage::new`]:
/// extension storage if the host has it, then local item storage if it
/// passes a write/remove probe, otherwise an in-memory map. No operation
/// ever reports an error to the caller.
pub struct PrefStorage {
    key_prefix: String,
    backend: Box<dyn Backend>,
}

impl PrefStorage {
    pub fn new(key_prefix: Option<&str>, host: &Host) -> Self {
        let backend = select_backend(host);
        let key_prefix = key_prefix.unwrap_or_default().to_string();

        tracing::debug!(
            "Preference store using {} backend (prefix {:?})",
            backend.kind(),
            key_prefix
        );

        Self {
            key_prefix,
            backend,
        }
    }

    /// A store that keeps everything in memory.
    pub fn in_memory(key_prefix: Option<&str>) -> Self {
        Self::new(key_prefix, &Host::empty())
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn prefix(&self) -> &str {
        &self.key_prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }

    /// Fetch the value stored under `name` and pass it to `on_get`, or `None`
    /// if nothing usable is stored.
    ///
    /// Memory and local backends call `on_get` before returning. The
    /// extension backend calls it later from a runtime task.
    pub fn get<F>(&self, name: &str, on_get: F)
    where
        F: FnOnce(Option<Value>) + Send + 'static,
    {
        let on_get: OnGet = Box::new(on_get);
        self.backend.get(self.key(name), on_get);
    }

    /// Store `value` under `name`. Failures are logged, never returned.
    pub fn set<T>(&self, name: &str, value: &T)
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value) {
            Ok(value) => self.backend.set(self.key(name), value),
            Err(e) => tracing::warn!("Failed to encode preference {}: {}", name, e),
        }
    }

    pub fn remove(&self, name: &str) {
        self.backend.remove(self.key(name));
    }

    /// Awaitable form of [`get`](Self::get), usable with every backend.
    pub async fn fetch(&self, name: &str) -> Option<Value> {
        let (tx, rx) = oneshot::channel();
        self.get(name, move |value| {
            let _ = tx.send(value);
        });
        // A dropped sender means the read task died; treat it like a miss.
        rx.await.ok().flatten()
    }

    /// [`fetch`](Self::fetch) and decode into `T`. A value of the wrong shape reads as `None`.
    pub async fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.fetch(name).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!("Preference {} has unexpected shape: {}", name, e);
                None
            }
        }
    }

    /// Wait for writes that were handed off to an asynchronous backend.
    pub async fn flush(&self) {
        if let Some(done) = self.backend.barrier() {
            if done.await.is_err() {
                tracing::warn!("Preference storage stopped before pending writes were applied");
            }
        }
    }
}

impl std::fmt::Debug for PrefStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefStorage")
            .field("key_prefix", &self.key_prefix)
            .field("backend", &self.backend.kind())
            .finish()
    }
}

fn select_backend(host: &Host) -> Box<dyn Backend> {
    if let Some(extension) = &host.extension {
        return Box::new(ExtensionBackend::new(extension));
    }

    if let Some(local) = &host.local {
        match LocalBackend::probe(local.clone()) {
            Ok(backend) => return Box::new(backend),
            Err(e) => {
                tracing::warn!(
                    "Local storage is not available, falling back to in-memory storage: {}",
                    e
                );
            }
        }
    }

    Box::new(MemoryBackend::new())
}
