//! SQLite-backed extension area storing native JSON values.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

use super::ExtensionArea;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS prefs (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
"#;

/// Extension-style storage area on top of a SQLite database.
#[derive(Clone)]
pub struct SqliteArea {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteArea {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!("Opened extension storage at {}", path.display());
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("extension storage connection poisoned".to_string()))
    }
}

#[async_trait]
impl ExtensionArea for SqliteArea {
    async fn get(&self, keys: Vec<String>) -> Result<Map<String, Value>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT value FROM prefs WHERE key = ?1")?;

        let mut found = Map::new();
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .optional()?;
            if let Some(raw) = raw {
                found.insert(key, serde_json::from_str(&raw)?);
            }
        }
        Ok(found)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp_millis();
        for (key, value) in &items {
            tx.execute(
                "INSERT INTO prefs (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, serde_json::to_string(value)?, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        let conn = self.conn()?;
        for key in keys {
            conn.execute("DELETE FROM prefs WHERE key = ?1", params![key])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn items(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_batched_get_skips_missing_keys() {
        let area = SqliteArea::open_in_memory().unwrap();
        area.set(items(&[("a", json!(1)), ("b", json!({"nested": [true, null]}))]))
            .await
            .unwrap();

        let got = area
            .get(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["a"], json!(1));
        assert_eq!(got["b"], json!({"nested": [true, null]}));
    }

    #[tokio::test]
    async fn test_set_overwrites_and_remove_deletes() {
        let area = SqliteArea::open_in_memory().unwrap();
        area.set(items(&[("k", json!("old"))])).await.unwrap();
        area.set(items(&[("k", json!("new"))])).await.unwrap();

        let got = area.get(vec!["k".to_string()]).await.unwrap();
        assert_eq!(got["k"], json!("new"));

        area.remove(vec!["k".to_string()]).await.unwrap();
        assert!(area.get(vec!["k".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ext").join("prefs.db");

        {
            let area = SqliteArea::open(&path).unwrap();
            area.set(items(&[("theme", json!("dark"))])).await.unwrap();
        }

        let area = SqliteArea::open(&path).unwrap();
        let got = area.get(vec!["theme".to_string()]).await.unwrap();
        assert_eq!(got["theme"], json!("dark"));
    }
}
