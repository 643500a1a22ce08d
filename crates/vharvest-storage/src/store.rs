//! The artifact store seam.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use vharvest_models::ArtifactKey;

use crate::error::StorageResult;

/// Durable keyed blob store holding harvested artifacts.
///
/// Writes are last-write-wins: uploading to an existing key replaces it.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Whether an object is stored under `key`.
    async fn exists(&self, key: &ArtifactKey) -> StorageResult<bool>;

    /// Upload a local file.
    async fn upload(&self, key: &ArtifactKey, path: &Path, content_type: &str)
        -> StorageResult<()>;

    /// Upload an in-memory body.
    async fn upload_bytes(
        &self,
        key: &ArtifactKey,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Read an object back. `StorageError::NotFound` when absent.
    async fn fetch(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>>;

    /// Time-limited GET URL for an object.
    async fn presign_get(&self, key: &ArtifactKey, expires_in: Duration) -> StorageResult<String>;

    /// Cheap reachability probe used by readiness checks.
    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}
