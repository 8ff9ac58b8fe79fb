//! High-level registry interface

use pageshelf::clock::{SharedClock, SystemClock};
use pageshelf::naming::{normalize_tenant, sanitize_slug};
use pageshelf::PageId;
use std::sync::Arc;

use crate::error::{RegistryError, Result};
use crate::pointer::ActivePointer;
use crate::publish::{PublishReceipt, PublishRequest, Publisher, SingleHtmlRequest};
use crate::ratelimit::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::resolve::{ContentResolver, ResolvedContent, parse_segments};
use crate::storage::{BlobStorage, KvStorage};
use crate::versions::{VersionEntry, VersionStore};

/// Publishing, rollback and content resolution over one pair of backends
pub struct Registry {
    store: Arc<VersionStore>,
    publisher: Publisher,
    resolver: ContentResolver,
    limiter: RateLimiter,
}

/// Builder for [`Registry`]
pub struct RegistryBuilder {
    blobs: Arc<dyn BlobStorage>,
    kv: Arc<dyn KvStorage>,
    clock: SharedClock,
    rate_limit: RateLimitConfig,
}

impl RegistryBuilder {
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn build(self) -> Registry {
        let store = Arc::new(VersionStore::new(
            self.kv.clone(),
            self.blobs,
            self.clock.clone(),
        ));

        Registry {
            publisher: Publisher::new(store.clone()),
            resolver: ContentResolver::new(store.clone()),
            limiter: RateLimiter::new(self.kv, self.rate_limit, self.clock),
            store,
        }
    }
}

impl Registry {
    /// Registry on the system clock with the default rate limit
    pub fn new(blobs: Arc<dyn BlobStorage>, kv: Arc<dyn KvStorage>) -> Self {
        Self::builder(blobs, kv).build()
    }

    pub fn builder(blobs: Arc<dyn BlobStorage>, kv: Arc<dyn KvStorage>) -> RegistryBuilder {
        RegistryBuilder {
            blobs,
            kv,
            clock: Arc::new(SystemClock),
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// Count a mutation against the caller's rate-limit window
    pub async fn admit(&self, endpoint: &str, fingerprint: &str) -> Result<RateLimitStatus> {
        self.limiter
            .check(endpoint, fingerprint)
            .await
            .map_err(|exceeded| RegistryError::RateLimited {
                retry_after: exceeded.retry_after,
                limit: exceeded.limit,
            })
    }

    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt> {
        self.publisher.publish(request).await
    }

    pub async fn publish_single_html(&self, request: SingleHtmlRequest) -> Result<PublishReceipt> {
        self.publisher.publish_single_html(request).await
    }

    /// Point a slug back at one of its existing versions
    pub async fn rollback(&self, tenant: &str, slug: &str, version: u64) -> Result<ActivePointer> {
        let tenant = normalize_tenant(tenant)?;
        let slug = sanitize_slug(Some(slug));
        self.store.rollback(&tenant, &slug, version).await
    }

    /// Versions of a slug, newest first
    pub async fn list_versions(&self, tenant: &str, slug: &str) -> Result<Vec<VersionEntry>> {
        let tenant = normalize_tenant(tenant)?;
        let slug = sanitize_slug(Some(slug));
        self.store.list_versions(&tenant, &slug).await
    }

    /// Resolve a path below `/p/{tenant}/`
    pub async fn resolve(
        &self,
        tenant: &str,
        path: &str,
        referer: Option<&str>,
    ) -> Result<ResolvedContent> {
        self.resolver
            .resolve(tenant, &parse_segments(path), referer)
            .await
    }

    /// Entry document of `tenant:slug` or `tenant:slug:version`
    pub async fn get_content(&self, page_id: &str) -> Result<ResolvedContent> {
        let page_id: PageId = page_id.parse()?;
        match page_id.version {
            Some(version) => {
                self.resolver
                    .resolve_version(&page_id.tenant, &page_id.slug, version, "")
                    .await
            }
            None => {
                self.resolver
                    .resolve_in_slug(&page_id.tenant, &page_id.slug, "")
                    .await
            }
        }
    }

    /// Current pointer of a slug, if one was ever written
    pub async fn pointer(&self, tenant: &str, slug: &str) -> Result<Option<ActivePointer>> {
        let tenant = normalize_tenant(tenant)?;
        self.store
            .get_pointer(&tenant, &sanitize_slug(Some(slug)))
            .await
    }
}
