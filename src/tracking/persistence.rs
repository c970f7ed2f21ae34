use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt store file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// String key-value storage for app state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;
    async fn clear(&self) -> Result<(), PersistenceError>;
    async fn all_keys(&self) -> Result<Vec<String>, PersistenceError>;

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>, PersistenceError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push((key.clone(), self.get(key).await?));
        }
        Ok(out)
    }
}

/// Every key with its raw value, for export. Values that are JSON are
/// embedded as JSON; anything else is kept as a string.
pub async fn export_dump(store: &dyn KeyValueStore) -> Result<serde_json::Value, PersistenceError> {
    let keys = store.all_keys().await?;
    let mut dump = serde_json::Map::new();
    for (key, value) in store.multi_get(&keys).await? {
        let value = match value {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)),
            None => serde_json::Value::Null,
        };
        dump.insert(key, value);
    }
    Ok(serde_json::Value::Object(dump))
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn all_keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}

/// One JSON object file of key -> string, rewritten whole on every `set`.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        // write-then-rename
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), keys = entries.len(), "Store file written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries).await
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn all_keys(&self) -> Result<Vec<String>, PersistenceError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_keys().collect())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>, PersistenceError> {
        let _guard = self.lock.lock().await;
        let entries = self.read_all().await?;
        Ok(keys
            .iter()
            .map(|k| (k.clone(), entries.get(k).cloned()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_set_get_clear() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("nested").join("state.json"));
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "two".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.all_keys().await.unwrap(), vec!["a", "b"]);

        // a fresh handle sees the same file
        let reopened = FileKeyValueStore::new(store.path());
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("two"));

        store.clear().await.unwrap();
        assert!(store.all_keys().await.unwrap().is_empty());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileKeyValueStore::new(&path);
        assert!(matches!(store.get("a").await, Err(PersistenceError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_export_dump_embeds_json_values() {
        let store = MemoryKeyValueStore::new();
        store.set("state", r#"{"x":1}"#.to_string()).await.unwrap();
        store.set("note", "plain text".to_string()).await.unwrap();
        let dump = export_dump(&store).await.unwrap();
        assert_eq!(dump["state"]["x"], 1);
        assert_eq!(dump["note"], "plain text");
    }

    #[tokio::test]
    async fn test_multi_get_reports_missing_keys() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1".to_string()).await.unwrap();
        let got = store
            .multi_get(&["a".to_string(), "zz".to_string()])
            .await
            .unwrap();
        assert_eq!(got, vec![("a".to_string(), Some("1".to_string())), ("zz".to_string(), None)]);
    }
}
