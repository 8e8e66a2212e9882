//! Backend over an asynchronous extension area. Calls are queued to a single
//! worker task on the host runtime, so they apply in the order issued; reads
//! complete on that task, after `get` has returned.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::host::{ExtensionArea, ExtensionHost};

use super::backend::{present, Backend, BackendKind, OnGet};

/// Read callback that fires exactly once: with the value, or with `None` if
/// the read is dropped before it runs.
struct Reply(Option<OnGet>);

impl Reply {
    fn complete(mut self, value: Option<Value>) {
        if let Some(on_get) = self.0.take() {
            on_get(value);
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(on_get) = self.0.take() {
            on_get(None);
        }
    }
}

enum Op {
    Get { key: String, reply: Reply },
    Set { key: String, value: Value },
    Remove { key: String },
    Barrier(oneshot::Sender<()>),
}

pub struct ExtensionBackend {
    ops: mpsc::UnboundedSender<Op>,
}

impl ExtensionBackend {
    pub fn new(host: &ExtensionHost) -> Self {
        let (ops, rx) = mpsc::unbounded_channel();
        host.runtime.spawn(drain(host.area.clone(), rx));
        Self { ops }
    }

    /// Queue `op`. If the worker is gone the op is dropped here, which
    /// completes any pending read with `None`.
    fn enqueue(&self, op: Op) -> bool {
        self.ops.send(op).is_ok()
    }
}

async fn drain(area: Arc<dyn ExtensionArea>, mut ops: mpsc::UnboundedReceiver<Op>) {
    while let Some(op) = ops.recv().await {
        match op {
            Op::Get { key, reply } => {
                let value = match area.get(vec![key.clone()]).await {
                    Ok(mut found) => found.remove(&key),
                    Err(e) => {
                        tracing::debug!("Extension storage read failed for {}: {}", key, e);
                        None
                    }
                };
                reply.complete(present(value));
            }
            Op::Set { key, value } => {
                let mut items = Map::new();
                items.insert(key, value);
                if let Err(e) = area.set(items).await {
                    tracing::warn!("Failed to save to extension storage: {}", e);
                }
            }
            Op::Remove { key } => {
                if let Err(e) = area.remove(vec![key.clone()]).await {
                    tracing::warn!("Failed to remove {} from extension storage: {}", key, e);
                }
            }
            Op::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

impl Backend for ExtensionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Extension
    }

    fn get(&self, key: String, on_get: OnGet) {
        let reply = Reply(Some(on_get));
        if !self.enqueue(Op::Get { key, reply }) {
            tracing::debug!("Extension storage is not running; read yields nothing");
        }
    }

    fn set(&self, key: String, value: Value) {
        if !self.enqueue(Op::Set { key: key.clone(), value }) {
            tracing::warn!("Extension storage is not running; dropped write to {}", key);
        }
    }

    fn remove(&self, key: String) {
        if !self.enqueue(Op::Remove { key: key.clone() }) {
            tracing::warn!("Extension storage is not running; dropped removal of {}", key);
        }
    }

    fn barrier(&self) -> Option<oneshot::Receiver<()>> {
        let (done, wait) = oneshot::channel();
        // A dead worker drops `done`, so the receiver resolves immediately.
        self.enqueue(Op::Barrier(done));
        Some(wait)
    }
}
