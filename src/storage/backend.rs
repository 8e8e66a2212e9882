//! The contract shared by every preference backend.

use serde_json::Value;
use tokio::sync::oneshot;

/// Completion handler for a read. Receives `None` when nothing usable is stored.
pub type OnGet = Box<dyn FnOnce(Option<Value>) + Send + 'static>;

/// Which backend a store selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Extension,
    Local,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Extension => write!(f, "extension"),
            BackendKind::Local => write!(f, "local"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// A key/value backend operating on fully prefixed keys.
///
/// Implementations never fail outward: reads normalize every problem to
/// `None` and writes log what went wrong.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Look up `key` and call `on_get` exactly once.
    fn get(&self, key: String, on_get: OnGet);

    fn set(&self, key: String, value: Value);

    fn remove(&self, key: String);

    /// Resolves once every call issued so far has been applied. Synchronous
    /// backends have nothing in flight and return `None`.
    fn barrier(&self) -> Option<oneshot::Receiver<()>> {
        None
    }
}

/// Stored `null` reads the same as a missing key.
pub(crate) fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
