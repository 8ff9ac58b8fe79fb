//! Version store: active pointers over immutable version snapshots
//!
//! Version files are written to the blob store under
//! `{tenant}/{slug}/{version}/` and never modified. The active pointer in the
//! key-value store decides which of them is served. There is no locking: a
//! pointer write simply replaces whatever was there.

use pageshelf::INDEX_HTML;
use pageshelf::clock::SharedClock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::address::KeyLayout;
use crate::error::{RegistryError, Result};
use crate::pointer::{ActivePointer, DEFAULT_CACHE_TTL, expiry_at};
use crate::storage::{BlobStorage, KvStorage, StorageError, StoredObject};

/// How long an expired pointer lingers in the key-value store so reads can
/// still answer Gone instead of NotFound
const EXPIRED_POINTER_GRACE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// One entry of a version listing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: u64,
    pub object_key: String,
}

pub struct VersionStore {
    kv: Arc<dyn KvStorage>,
    blobs: Arc<dyn BlobStorage>,
    clock: SharedClock,
}

impl VersionStore {
    pub fn new(kv: Arc<dyn KvStorage>, blobs: Arc<dyn BlobStorage>, clock: SharedClock) -> Self {
        Self { kv, blobs, clock }
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Fetch the stored pointer, expired or not
    pub async fn get_pointer(&self, tenant: &str, slug: &str) -> Result<Option<ActivePointer>> {
        let key = KeyLayout::pointer_key(tenant, slug);
        match self.kv.get(&key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Fetch the pointer, mapping absence to NotFound and expiry to Gone
    pub async fn live_pointer(&self, tenant: &str, slug: &str) -> Result<ActivePointer> {
        let pointer = self
            .get_pointer(tenant, slug)
            .await?
            .ok_or_else(|| RegistryError::not_found(format!("page {tenant}:{slug}")))?;

        if pointer.is_expired(self.now_millis()) {
            return Err(RegistryError::gone(format!("page {tenant}:{slug}")));
        }

        Ok(pointer)
    }

    /// Overwrite the pointer for a tenant/slug
    pub async fn put_pointer(&self, tenant: &str, slug: &str, pointer: &ActivePointer) -> Result<()> {
        let key = KeyLayout::pointer_key(tenant, slug);
        let ttl = pointer.expires_at.map(|expires_at| {
            let remaining = expires_at.saturating_sub(self.now_millis());
            Duration::from_millis(remaining) + EXPIRED_POINTER_GRACE
        });

        self.kv
            .put(&key, serde_json::to_string(pointer)?, ttl)
            .await?;
        debug!(%key, version = pointer.version, "pointer written");
        Ok(())
    }

    /// Every pointer stored for a tenant, with its slug
    pub async fn list_pointers(&self, tenant: &str) -> Result<Vec<(String, ActivePointer)>> {
        let keys = self.kv.list_keys(&KeyLayout::pointer_prefix(tenant)).await?;
        let mut pointers = Vec::with_capacity(keys.len());

        for key in &keys {
            let Some(slug) = KeyLayout::slug_from_pointer_key(tenant, key) else {
                continue;
            };
            // A key can vanish between listing and reading
            if let Some(json) = self.kv.get(key).await? {
                pointers.push((slug.to_string(), serde_json::from_str(&json)?));
            }
        }

        Ok(pointers)
    }

    /// Write one file of a version
    pub async fn write_file(
        &self,
        object_key: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let key = KeyLayout::file_key(object_key, path);
        self.blobs.put(&key, data, Some(content_type)).await?;
        Ok(())
    }

    /// Read one file of a version, `None` when it does not exist
    pub async fn read_file(&self, object_key: &str, path: &str) -> Result<Option<StoredObject>> {
        let key = KeyLayout::file_key(object_key, path);
        match self.blobs.get(&key).await {
            Ok(object) => Ok(Some(object)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Relative paths of every file in a version, sorted
    pub async fn version_files(&self, object_key: &str) -> Result<Vec<String>> {
        let keys = self.blobs.list_all(object_key).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(object_key))
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Probe a version's entry document
    pub async fn version_exists(&self, tenant: &str, slug: &str, version: u64) -> Result<bool> {
        let prefix = KeyLayout::version_prefix(tenant, slug, version);
        Ok(self
            .blobs
            .exists(&KeyLayout::file_key(&prefix, INDEX_HTML))
            .await?)
    }

    /// Versions of a slug, newest first
    ///
    /// An expired pointer hides the whole slug, including older versions.
    pub async fn list_versions(&self, tenant: &str, slug: &str) -> Result<Vec<VersionEntry>> {
        if let Some(pointer) = self.get_pointer(tenant, slug).await? {
            if pointer.is_expired(self.now_millis()) {
                debug!(tenant, slug, "pointer expired, listing nothing");
                return Ok(Vec::new());
            }
        }

        let slug_prefix = KeyLayout::slug_prefix(tenant, slug);
        let versions: BTreeSet<u64> = self
            .blobs
            .list_all(&slug_prefix)
            .await?
            .iter()
            .filter_map(|key| KeyLayout::parse_version(&slug_prefix, key))
            .collect();

        Ok(versions
            .into_iter()
            .rev()
            .map(|version| VersionEntry {
                version,
                object_key: KeyLayout::version_prefix(tenant, slug, version),
            })
            .collect())
    }

    /// Point a slug back at an existing version
    ///
    /// Cache TTL, headers and expiry carry over from the current pointer (or
    /// defaults when there is none). A target without an entry document is
    /// NotFound and leaves the pointer untouched.
    pub async fn rollback(&self, tenant: &str, slug: &str, version: u64) -> Result<ActivePointer> {
        if !self.version_exists(tenant, slug, version).await? {
            return Err(RegistryError::not_found(format!(
                "version {version} of {tenant}:{slug}"
            )));
        }

        let existing = self.get_pointer(tenant, slug).await?;
        let now = self.now_millis();
        let pointer = ActivePointer {
            object_key: KeyLayout::version_prefix(tenant, slug, version),
            version,
            published_at: now,
            cache_ttl: existing
                .as_ref()
                .map_or(DEFAULT_CACHE_TTL, |pointer| pointer.cache_ttl),
            expires_at: match &existing {
                Some(pointer) => pointer.expires_at,
                None => Some(expiry_at(now, None)),
            },
            headers: existing
                .map(|pointer| pointer.headers)
                .unwrap_or_else(ActivePointer::default_headers),
        };

        self.put_pointer(tenant, slug, &pointer).await?;
        info!(tenant, slug, version, "rolled back");
        Ok(pointer)
    }
}
