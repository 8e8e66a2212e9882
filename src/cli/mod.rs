//! CLI commands for prefstore using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tokio::runtime::Handle;

use crate::config::{get_home_dir, load_settings_or_default};
use crate::host::Host;
use crate::storage::PrefStorage;

/// prefstore - read and write prefixed JSON preferences.
#[derive(Parser, Debug)]
#[command(name = "prefstore")]
#[command(version = "0.1.0")]
#[command(about = "Read and write prefixed JSON preferences", long_about = None)]
pub struct Commands {
    /// Key prefix, overriding key_prefix from settings.json
    #[arg(long, global = true, env = "PREFSTORE_PREFIX")]
    pub prefix: Option<String>,

    /// Directory holding settings.json and default storage files
    #[arg(long, global = true, env = "PREFSTORE_HOME")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a stored value as JSON (null when absent)
    Get { name: String },

    /// Store a value; input that is not valid JSON is stored as a string
    Set { name: String, value: String },

    /// Remove a stored value
    Remove { name: String },

    /// Show which backend was selected
    Backend,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let store = self.open_store()?;

        match &self.command {
            Command::Get { name } => {
                let value = store.fetch(name).await.unwrap_or(Value::Null);
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Command::Set { name, value } => {
                store.set(name, &parse_value(value));
                store.flush().await;
            }
            Command::Remove { name } => {
                store.remove(name);
                store.flush().await;
            }
            Command::Backend => println!("{}", store.kind()),
        }
        Ok(())
    }

    /// Build the store described by the flags and settings.json.
    pub fn open_store(&self) -> Result<PrefStorage> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => get_home_dir()?,
        };
        let settings = load_settings_or_default(&home);
        let host = Host::from_settings(&settings, &home, Handle::try_current().ok());
        let prefix = self.prefix.as_deref().unwrap_or(&settings.key_prefix);

        Ok(PrefStorage::new(Some(prefix), &host))
    }
}

/// Parse CLI input as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Commands {
        Commands::try_parse_from(std::iter::once("prefstore").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("{\"a\":true}"), json!({"a": true}));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_value("dark"), json!("dark"));
    }

    #[test]
    fn test_parse_args() {
        let cmd = parse(&["--prefix", "app.", "set", "theme", "dark"]);
        assert_eq!(cmd.prefix.as_deref(), Some("app."));
        assert!(matches!(
            cmd.command,
            Command::Set { ref name, ref value } if name == "theme" && value == "dark"
        ));
    }

    #[tokio::test]
    async fn test_set_then_get_through_local_file() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().to_str().unwrap();

        parse(&["--home", home, "--prefix", "app.", "set", "theme", "dark"])
            .run()
            .await
            .unwrap();

        let store = parse(&["--home", home, "--prefix", "app.", "backend"])
            .open_store()
            .unwrap();
        assert_eq!(store.kind(), BackendKind::Local);
        assert_eq!(store.fetch("theme").await, Some(json!("dark")));
    }

    #[tokio::test]
    async fn test_extension_from_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"key_prefix": "ext.", "extension": {"enabled": true}}"#,
        )
        .unwrap();
        let home = dir.path().to_str().unwrap();

        parse(&["--home", home, "set", "volume", "7"])
            .run()
            .await
            .unwrap();

        let store = parse(&["--home", home, "get", "volume"]).open_store().unwrap();
        assert_eq!(store.kind(), BackendKind::Extension);
        assert_eq!(store.prefix(), "ext.");
        assert_eq!(store.fetch("volume").await, Some(json!(7)));
    }
}
