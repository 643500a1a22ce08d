//! Artifact storage.
//!
//! This crate provides:
//! - The `ArtifactStore` trait the harvester writes through
//! - An S3 client (AWS, or R2/MinIO via a custom endpoint)
//! - An in-memory store for local runs and tests

pub mod error;
pub mod memory;
pub mod s3;
pub mod store;

use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use s3::{S3Store, StoreConfig};
pub use store::ArtifactStore;

/// Build the store selected by `STORAGE_BACKEND` (`s3` unless set to `memory`).
pub fn store_from_env() -> StorageResult<Arc<dyn ArtifactStore>> {
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "s3".to_string());
    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            tracing::warn!("Using in-memory artifact store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        "s3" | "" => Ok(Arc::new(S3Store::from_env()?)),
        other => Err(StorageError::config_error(format!(
            "unknown STORAGE_BACKEND: {}",
            other
        ))),
    }
}
