//! `ConfigStore` backed by a JSON file holding `{ "<key>": <value>, ... }`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use mk_core::error::StoreError;
use mk_core::ConfigStore;

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole file; a missing file reads as empty.
    async fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StoreError::Read(format!("{}: {}", self.path.display(), e))),
        };

        match serde_json::from_str(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Read(format!("{}: not a JSON object", self.path.display()))),
        }
    }
}

impl ConfigStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);

        let text = serde_json::to_string_pretty(&Value::Object(all))?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| StoreError::Write(format!("{}: {}", self.path.display(), e)))
    }
}
