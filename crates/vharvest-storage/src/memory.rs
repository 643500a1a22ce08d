//! In-process store for local development and tests.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use vharvest_models::ArtifactKey;

use crate::error::{StorageError, StorageResult};
use crate::store::ArtifactStore;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Keeps objects in a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn content_type(&self, key: &ArtifactKey) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key.as_str())
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn exists(&self, key: &ArtifactKey) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key.as_str()))
    }

    async fn upload(
        &self,
        key: &ArtifactKey,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(key, data, content_type).await
    }

    async fn upload_bytes(
        &self,
        key: &ArtifactKey,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.objects.write().await.insert(
            key.as_str().to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key.as_str())
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::not_found(key.as_str()))
    }

    async fn presign_get(&self, key: &ArtifactKey, expires_in: Duration) -> StorageResult<String> {
        if !self.exists(key).await? {
            return Err(StorageError::not_found(key.as_str()));
        }
        Ok(format!(
            "memory:///{}?expires_in={}",
            key.as_str(),
            expires_in.as_secs()
        ))
    }
}
