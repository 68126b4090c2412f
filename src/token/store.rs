//! Token store implementations
//!
//! Provides in-memory and file-based key/value persistence for credentials.

use crate::error::{Error, Result};
use crate::types::StringMap;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistent key/value storage for credentials
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory token store (no persistence)
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    values: Arc<RwLock<StringMap>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a token
    pub fn with_token(token: impl Into<String>) -> Self {
        let mut values = StringMap::new();
        values.insert(super::AUTH_KEY.to_string(), token.into());
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Token store persisted as a JSON object on disk
///
/// Values are cached in memory; every write rewrites the whole file through
/// a temp file and a rename.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    values: RwLock<StringMap>,
}

impl FileTokenStore {
    /// Open a store, loading existing values if the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                Error::token_store(format!("Failed to read token file: {e}"))
            })?;
            if contents.trim().is_empty() {
                StringMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    Error::token_store(format!("Failed to parse token file: {e}"))
                })?
            }
        } else {
            StringMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, values: &StringMap) -> Result<()> {
        let contents = serde_json::to_string_pretty(values)
            .map_err(|e| Error::token_store(format!("Failed to serialize tokens: {e}")))?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::token_store(format!("Failed to write token file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::token_store(format!("Failed to rename token file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().await;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }
}
