//! Error types for the pageshelf registry

use pageshelf::ValidationError;
use thiserror::Error;

use crate::storage::StorageError;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64, limit: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn gone(what: impl Into<String>) -> Self {
        Self::Gone(what.into())
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
