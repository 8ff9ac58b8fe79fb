//! S3-compatible storage implementation using MinIO client
//!
//! Works with AWS S3, MinIO, R2 and any S3-compatible object storage. Version
//! files live under `{tenant}/{slug}/{version}/`, each carrying its content
//! type as the object's `Content-Type`.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use minio::s3::{
    client::Client,
    creds::StaticProvider,
    http::BaseUrl,
    multimap::{Multimap, MultimapExt},
    segmented_bytes::SegmentedBytes,
    types::{S3Api, ToStream},
};
use std::str::FromStr;

use super::blob_storage::{DEFAULT_PAGE_SIZE, ListPage, ObjectMeta, StoredObject};
use super::{BlobStorage, StorageError};

/// S3-compatible storage implementation using MinIO client
pub struct S3Storage {
    client: Client,
    bucket: String,
    page_size: usize,
}

impl S3Storage {
    /// Create a new S3 storage instance
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Create S3 storage from environment variables
    ///
    /// Expects:
    /// - S3_ACCESS_KEY_ID
    /// - S3_SECRET_ACCESS_KEY
    /// - S3_ENDPOINT_URL (for S3-compatible services like MinIO)
    /// - S3_BUCKET
    pub fn from_env() -> Result<Self, StorageError> {
        let bucket = std::env::var("S3_BUCKET").map_err(|_| {
            StorageError::Backend("S3_BUCKET environment variable not set".to_string())
        })?;

        let access_key = std::env::var("S3_ACCESS_KEY_ID").map_err(|_| {
            StorageError::Backend("S3_ACCESS_KEY_ID environment variable not set".to_string())
        })?;

        let secret_key = std::env::var("S3_SECRET_ACCESS_KEY").map_err(|_| {
            StorageError::Backend("S3_SECRET_ACCESS_KEY environment variable not set".to_string())
        })?;

        let endpoint_url = std::env::var("S3_ENDPOINT_URL").map_err(|_| {
            StorageError::Backend("S3_ENDPOINT_URL environment variable not set".to_string())
        })?;

        let base_url = BaseUrl::from_str(&endpoint_url)
            .map_err(|e| StorageError::Backend(format!("Invalid S3_ENDPOINT_URL: {}", e)))?;

        let creds_provider = StaticProvider::new(&access_key, &secret_key, None);

        let client = Client::new(base_url, Some(Box::new(creds_provider)), None, None)
            .map_err(|e| StorageError::Backend(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self::new(client, bucket))
    }

    /// Ensure bucket exists (create if it doesn't)
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let response = self
            .client
            .bucket_exists(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!("Failed to check bucket '{}': {}", self.bucket, e))
            })?;

        if response.exists {
            return Ok(());
        }

        self.client
            .create_bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!("Failed to create bucket '{}': {}", self.bucket, e))
            })?;

        Ok(())
    }

    /// Validate S3 key format
    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.len() > 1024 {
            return Err(StorageError::InvalidKey(
                "Key must be between 1 and 1024 characters".into(),
            ));
        }

        if key.starts_with('/') || key.ends_with('/') {
            return Err(StorageError::InvalidKey(
                "Key cannot start or end with '/'".into(),
            ));
        }

        Ok(())
    }

    fn is_not_found(error: &impl std::fmt::Display) -> bool {
        let message = error.to_string();
        message.contains("NoSuchKey") || message.contains("404")
    }

    /// Request headers carrying an object's content type
    fn content_type_headers(content_type: Option<&str>) -> Option<Multimap> {
        content_type.filter(|ct| !ct.trim().is_empty()).map(|ct| {
            let mut headers = Multimap::new();
            headers.add("Content-Type", ct);
            headers
        })
    }
}

/// Content type stored with an object, ignoring S3's generic default
fn stored_content_type(header: Option<&str>) -> Option<String> {
    header
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != "binary/octet-stream")
        .map(str::to_string)
}

#[async_trait]
impl BlobStorage for S3Storage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        Self::validate_key(key)?;

        let bytes = SegmentedBytes::from(Bytes::from(data));

        self.client
            .put_object(&self.bucket, key, bytes)
            .extra_headers(Self::content_type_headers(content_type))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to put file '{}': {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        Self::validate_key(key)?;

        let response = self
            .client
            .get_object(&self.bucket, key)
            .send()
            .await
            .map_err(|e| {
                if Self::is_not_found(&e) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(format!("Failed to get file '{}': {}", key, e))
                }
            })?;

        let content_type = stored_content_type(
            response
                .headers
                .get("content-type")
                .and_then(|value| value.to_str().ok()),
        );
        let content = response.content.to_segmented_bytes().await.map_err(|e| {
            StorageError::Backend(format!("Failed to read file '{}' content: {}", key, e))
        })?;

        Ok(StoredObject {
            data: content.to_bytes().to_vec(),
            content_type,
        })
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Self::validate_key(key)?;

        match self.client.stat_object(&self.bucket, key).send().await {
            Ok(stat) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: Some(stat.size),
                content_type: stored_content_type(
                    stat.headers
                        .get("content-type")
                        .and_then(|value| value.to_str().ok()),
                ),
            })),
            Err(e) if Self::is_not_found(&e) => Ok(None),
            Err(e) => Err(StorageError::Backend(format!(
                "Failed to check existence of file '{}': {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        Self::validate_key(key)?;

        self.client
            .delete_object(&self.bucket, key)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!("Failed to delete file '{}': {}", key, e))
            })?;

        Ok(())
    }

    /// One bounded `ListObjectsV2` request starting after `cursor`
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage, StorageError> {
        let max_keys = u16::try_from(self.page_size).unwrap_or(u16::MAX);
        let mut stream = self
            .client
            .list_objects(&self.bucket)
            .prefix(Some(prefix.to_string()))
            .recursive(true)
            .max_keys(Some(max_keys))
            .start_after(cursor.map(str::to_string))
            .to_stream()
            .await;

        let Some(result) = stream.next().await else {
            return Ok(ListPage::default());
        };
        let response = result.map_err(|e| {
            StorageError::Backend(format!(
                "Failed to list files with prefix '{}': {}",
                prefix, e
            ))
        })?;

        let mut keys: Vec<String> = response
            .contents
            .into_iter()
            .map(|entry| entry.name)
            .take(self.page_size)
            .collect();
        keys.sort();

        let cursor = if response.is_truncated {
            keys.last().cloned()
        } else {
            None
        };
        Ok(ListPage { keys, cursor })
    }
}
