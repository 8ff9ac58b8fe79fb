//! Redis-backed key-value storage
//!
//! Pointers are stored as JSON strings and rate-limit counters as decimal
//! strings. TTLs map onto `SET ... EX`.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

use super::{KvStorage, StorageError};

pub struct RedisKvStorage {
    connection: MultiplexedConnection,
}

impl RedisKvStorage {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }

    /// Connect to the Redis server at `url`, e.g. `redis://127.0.0.1:6379`
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)
            .map_err(|e| StorageError::Backend(format!("Invalid Redis URL: {}", e)))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self::new(connection))
    }

    fn ttl_seconds(ttl: Duration) -> usize {
        usize::try_from(ttl.as_secs().max(1)).unwrap_or(usize::MAX)
    }

    /// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`
    fn match_pattern(prefix: &str) -> String {
        let mut pattern = String::with_capacity(prefix.len() + 1);
        for c in prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }
}

#[async_trait]
impl KvStorage for RedisKvStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut connection = self.connection.clone();
        connection
            .get::<_, Option<String>>(key)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to get '{}': {}", key, e)))
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let mut connection = self.connection.clone();
        let result = match ttl {
            Some(ttl) => {
                connection
                    .set_ex::<_, _, ()>(key, value, Self::ttl_seconds(ttl))
                    .await
            }
            None => connection.set::<_, _, ()>(key, value).await,
        };

        result.map_err(|e| StorageError::Backend(format!("Failed to put '{}': {}", key, e)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(key)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to delete '{}': {}", key, e)))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut connection = self.connection.clone();
        let mut keys = Vec::new();
        {
            let mut iter = connection
                .scan_match::<_, String>(Self::match_pattern(prefix))
                .await
                .map_err(|e| {
                    StorageError::Backend(format!("Failed to scan prefix '{}': {}", prefix, e))
                })?;

            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
