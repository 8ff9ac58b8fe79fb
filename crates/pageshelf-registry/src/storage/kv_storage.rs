//! Key-value storage abstraction for pointers and rate-limit counters

use async_trait::async_trait;
use pageshelf::clock::{SharedClock, SystemClock};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::StorageError;

/// Abstraction for TTL-capable key-value backends
#[async_trait]
pub trait KvStorage: Send + Sync {
    /// Fetch a value; expired entries read as absent
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store a value, optionally expiring after `ttl`
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, in lexicographic order
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at_ms: Option<u64>,
}

/// In-memory key-value storage with lazily evaluated TTLs
pub struct MemoryKvStorage {
    data: Mutex<BTreeMap<String, Entry>>,
    clock: SharedClock,
}

impl Default for MemoryKvStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStorage {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Memory storage that evaluates TTLs against `clock`
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    fn is_live(entry: &Entry, now: u64) -> bool {
        entry.expires_at_ms.is_none_or(|expires| now < expires)
    }
}

#[async_trait]
impl KvStorage for MemoryKvStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.now_millis();
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        match storage.get(key) {
            Some(entry) if Self::is_live(entry, now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                storage.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let expires_at_ms = ttl.map(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            self.clock.now_millis().saturating_add(ttl_ms)
        });

        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let now = self.clock.now_millis();
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        Ok(storage
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && Self::is_live(entry, now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageshelf::clock::ManualClock;

    #[tokio::test]
    async fn test_put_get_delete() {
        let kv = MemoryKvStorage::new();

        kv.put("pages:alice:index", "{}".into(), None).await.unwrap();
        assert_eq!(
            kv.get("pages:alice:index").await.unwrap().as_deref(),
            Some("{}")
        );

        kv.delete("pages:alice:index").await.unwrap();
        assert_eq!(kv.get("pages:alice:index").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry_follows_clock() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let kv = MemoryKvStorage::with_clock(clock.clone());

        kv.put("counter", "3".into(), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        clock.advance_secs(59);
        assert_eq!(kv.get("counter").await.unwrap().as_deref(), Some("3"));

        clock.advance_secs(1);
        assert_eq!(kv.get("counter").await.unwrap(), None);
        assert!(kv.list_keys("count").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let kv = MemoryKvStorage::new();
        for key in ["pages:alice:docs", "pages:alice:index", "pages:bob:index"] {
            kv.put(key, "{}".into(), None).await.unwrap();
        }

        assert_eq!(
            kv.list_keys("pages:alice:").await.unwrap(),
            vec!["pages:alice:docs", "pages:alice:index"]
        );
    }
}
