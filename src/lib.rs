//! prefstore library root.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod storage;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use error::{Error, Result};
pub use host::{ExtensionArea, FileItemStorage, Host, ItemStorage, SqliteArea};
pub use storage::{BackendKind, PrefStorage};
