//! Configuration loading for prefstore.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Browsers cap local storage at roughly this much per origin.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Get the prefstore home directory (~/.prefstore).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".prefstore"))
}

/// Get the settings file path inside `home`.
pub fn get_settings_path(home: &Path) -> PathBuf {
    home.join("settings.json")
}

/// Load settings from `<home>/settings.json`.
pub fn load_settings(home: &Path) -> Result<Settings> {
    let path = get_settings_path(home);

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.local.quota_bytes == 0 {
        return Err(Error::Config(
            "local.quota_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Load settings or return default if not found.
pub fn load_settings_or_default(home: &Path) -> Settings {
    load_settings(home).unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// File-backed item storage configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_enabled")]
    pub enabled: bool,
    /// Defaults to `<home>/local_storage.json`.
    pub path: Option<PathBuf>,
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
}

fn default_local_enabled() -> bool {
    true
}

fn default_quota_bytes() -> usize {
    DEFAULT_QUOTA_BYTES
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_local_enabled(),
            path: None,
            quota_bytes: default_quota_bytes(),
        }
    }
}

impl LocalStorageConfig {
    pub fn resolved_path(&self, home: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| home.join("local_storage.json"))
    }
}

/// SQLite-backed extension area configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExtensionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Defaults to `<home>/extension.db`.
    pub path: Option<PathBuf>,
}

impl ExtensionConfig {
    pub fn resolved_path(&self, home: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| home.join("extension.db"))
    }
}

/// prefstore settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub key_prefix: String,

    #[serde(default)]
    pub local: LocalStorageConfig,

    #[serde(default)]
    pub extension: ExtensionConfig,
}
