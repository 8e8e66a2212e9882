//! Host collaborators: the storage APIs a preference store can be built on.
//!
//! A [`Host`] describes which APIs exist in the current environment. It is
//! handed to [`PrefStorage::new`](crate::storage::PrefStorage::new) so the
//! store never reaches for global state itself.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::config::Settings;
use crate::error::Result;

pub mod file;
pub mod lock;
pub mod sqlite;

pub use file::FileItemStorage;
pub use sqlite::SqliteArea;

/// Synchronous string-keyed item store (local-storage style).
pub trait ItemStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Asynchronous batched store holding native JSON values (extension-storage style).
#[async_trait]
pub trait ExtensionArea: Send + Sync {
    /// Fetch the given keys. Missing keys are absent from the returned map.
    async fn get(&self, keys: Vec<String>) -> Result<Map<String, Value>>;

    async fn set(&self, items: Map<String, Value>) -> Result<()>;

    async fn remove(&self, keys: Vec<String>) -> Result<()>;
}

/// An extension area plus the runtime its callbacks are scheduled on.
#[derive(Clone)]
pub struct ExtensionHost {
    pub area: Arc<dyn ExtensionArea>,
    pub runtime: Handle,
}

/// The storage APIs available to a store.
#[derive(Clone, Default)]
pub struct Host {
    pub extension: Option<ExtensionHost>,
    pub local: Option<Arc<dyn ItemStorage>>,
}

impl Host {
    /// A host with no persistent storage at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, local: Arc<dyn ItemStorage>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_extension(mut self, area: Arc<dyn ExtensionArea>, runtime: Handle) -> Self {
        self.extension = Some(ExtensionHost { area, runtime });
        self
    }

    /// Build a host from settings, opening whichever native backends are enabled.
    ///
    /// A backend that fails to open is treated as absent.
    pub fn from_settings(settings: &Settings, home: &Path, runtime: Option<Handle>) -> Self {
        let mut host = Host::empty();

        if settings.extension.enabled {
            let path = settings.extension.resolved_path(home);
            match runtime {
                Some(runtime) => match SqliteArea::open(&path) {
                    Ok(area) => host = host.with_extension(Arc::new(area), runtime),
                    Err(e) => tracing::warn!(
                        "Failed to open extension storage at {}: {}",
                        path.display(),
                        e
                    ),
                },
                None => {
                    tracing::warn!("Extension storage enabled but no async runtime is available");
                }
            }
        }

        if settings.local.enabled {
            let path = settings.local.resolved_path(home);
            host = host.with_local(Arc::new(FileItemStorage::with_quota(
                path,
                settings.local.quota_bytes,
            )));
        }

        host
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("extension", &self.extension.is_some())
            .field("local", &self.local.is_some())
            .finish()
    }
}
