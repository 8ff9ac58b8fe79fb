//! Blob storage abstraction for version files
//!
//! This module provides the object-store trait and an in-memory implementation
//! for testing and development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::StorageError;

/// Default number of keys returned per listing page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Object body plus the metadata stored alongside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Metadata returned by `head`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in lexicographic order
    pub keys: Vec<String>,
    /// Pass back to `list` to fetch the next page; `None` when exhausted
    pub cursor: Option<String>,
}

/// Abstraction for blob storage backends
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store data at the given key
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Retrieve data by key
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// Probe a key without fetching its body
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;

    /// Delete data by key
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List keys under `prefix`, resuming after `cursor`
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.head(key).await?.is_some())
    }

    /// Follow cursors until every key under `prefix` is collected
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list(prefix, cursor.as_deref()).await?;
            keys.extend(page.keys);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(keys)
    }
}

/// Apply start-after cursor pagination to an ordered key sequence
pub(crate) fn paginate<'a>(
    keys: impl Iterator<Item = &'a String>,
    prefix: &str,
    cursor: Option<&str>,
    page_size: usize,
) -> ListPage {
    let mut matching = keys
        .filter(|key| key.starts_with(prefix))
        .filter(|key| cursor.is_none_or(|after| key.as_str() > after))
        .take(page_size + 1)
        .cloned()
        .collect::<Vec<_>>();

    let cursor = if matching.len() > page_size {
        matching.truncate(page_size);
        matching.last().cloned()
    } else {
        None
    };

    ListPage {
        keys: matching,
        cursor,
    }
}

/// In-memory storage implementation for testing
#[derive(Debug)]
pub struct MemoryStorage {
    data: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Memory storage whose listings return at most `page_size` keys per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Get all stored keys (useful for testing)
    pub fn keys(&self) -> Vec<String> {
        self.data
            .lock()
            .map(|data| data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Get number of stored items
    pub fn len(&self) -> usize {
        self.data.lock().map(|data| data.len()).unwrap_or(0)
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        Ok(storage.get(key).map(|object| ObjectMeta {
            key: key.to_string(),
            size: Some(object.data.len() as u64),
            content_type: object.content_type.clone(),
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        Ok(paginate(storage.keys(), prefix, cursor, self.page_size))
    }
}
