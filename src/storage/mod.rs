//! Preference storage - one get/set interface over three backends.

pub mod backend;
pub mod extension;
pub mod local;
pub mod memory;
pub mod pref_storage;

pub use backend::{Backend, BackendKind, OnGet};
pub use pref_storage::PrefStorage;
