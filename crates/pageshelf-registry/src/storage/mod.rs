//! Storage collaborators for the registry
//!
//! Two backends are consumed: a blob store holding version files and a
//! TTL-capable key-value store holding active pointers and rate-limit counters.

pub mod blob_storage;
pub mod kv_storage;

#[cfg(feature = "s3")]
pub mod s3_storage;

#[cfg(feature = "redis")]
pub mod redis_storage;

pub use blob_storage::{BlobStorage, ListPage, MemoryStorage, ObjectMeta, StoredObject};
pub use kv_storage::{KvStorage, MemoryKvStorage};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),
}
