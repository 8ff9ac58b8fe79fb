//! Content resolution: map a serving path to one file of one version
//!
//! Requests arrive as `/p/{tenant}/{segments...}`. The first segment is usually
//! the slug, but pages that reference assets by root-relative or bare paths
//! produce requests like `/p/alice/styles.css` with no slug at all. For those
//! the slug is inferred from the `Referer`, then by scanning the tenant's live
//! pointers.

use pageshelf::naming::{normalize_tenant, sanitize_slug};
use pageshelf::{DEFAULT_SLUG, INDEX_HTML, content_type};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::address::KeyLayout;
use crate::error::{RegistryError, Result};
use crate::pointer::ActivePointer;
use crate::storage::StoredObject;
use crate::versions::VersionStore;

pub use pageshelf::naming::ASSET_DIRECTORIES;

/// Cache policy for the entry document, independent of the pointer
pub const ENTRY_CACHE_CONTROL: &str = "public, max-age=30, must-revalidate";

/// What a single path segment names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    Slug(String),
    AssetPath(String),
}

/// Classify a lone path segment as a slug or an asset path
pub fn classify_segment(segment: &str) -> PathTarget {
    if segment.contains('.') || ASSET_DIRECTORIES.contains(&segment) {
        PathTarget::AssetPath(segment.to_string())
    } else {
        PathTarget::Slug(segment.to_string())
    }
}

/// Split a request path into segments, dropping empty, `.` and `..` ones
pub fn parse_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(str::to_string)
        .collect()
}

/// Slug named by a `Referer` pointing at `/p/{tenant}/{slug}...`
///
/// Accepts absolute URLs and bare paths. A referer that is the tenant's root
/// page, or whose third segment is itself an asset, yields the default slug.
pub fn slug_from_referer(referer: &str, tenant: &str) -> Option<String> {
    let path = match referer.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |idx| &rest[idx..]),
        None => referer,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let segments = parse_segments(path);
    match segments.as_slice() {
        [p, t, rest @ ..] if p == "p" && t.eq_ignore_ascii_case(tenant) => {
            match rest.first().map(|segment| classify_segment(segment)) {
                Some(PathTarget::Slug(slug)) => Some(sanitize_slug(Some(slug.as_str()))),
                _ => Some(DEFAULT_SLUG.to_string()),
            }
        }
        _ => None,
    }
}

/// Cache-control for a resolved file
pub fn cache_control(path: &str, cache_ttl: u64) -> String {
    if is_entry_document(path) {
        ENTRY_CACHE_CONTROL.to_string()
    } else {
        format!("public, max-age={cache_ttl}")
    }
}

fn is_entry_document(path: &str) -> bool {
    path == INDEX_HTML || path.ends_with("/index.html")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A file resolved from a live version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub tenant: String,
    pub slug: String,
    pub version: u64,
    /// Path of the file inside the version
    pub path: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
    /// Pointer headers to attach to the response
    pub headers: BTreeMap<String, String>,
}

pub struct ContentResolver {
    store: Arc<VersionStore>,
}

impl ContentResolver {
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self { store }
    }

    /// Resolve request segments below `/p/{tenant}/`
    pub async fn resolve(
        &self,
        tenant: &str,
        segments: &[String],
        referer: Option<&str>,
    ) -> Result<ResolvedContent> {
        let tenant = normalize_tenant(tenant)?;

        match segments {
            [] => self.resolve_in_slug(&tenant, DEFAULT_SLUG, "").await,
            [segment] => match classify_segment(segment) {
                PathTarget::Slug(slug) => {
                    self.resolve_in_slug(&tenant, &sanitize_slug(Some(slug.as_str())), "")
                        .await
                }
                PathTarget::AssetPath(path) => self.resolve_asset(&tenant, &path, referer).await,
            },
            [slug, rest @ ..] => {
                self.resolve_in_slug(&tenant, &sanitize_slug(Some(slug.as_str())), &rest.join("/"))
                    .await
            }
        }
    }

    /// Resolve a path inside the slug's active version
    pub async fn resolve_in_slug(
        &self,
        tenant: &str,
        slug: &str,
        path: &str,
    ) -> Result<ResolvedContent> {
        let pointer = self.store.live_pointer(tenant, slug).await?;
        match self.find_file(&pointer.object_key, path).await? {
            Some((path, object)) => Ok(self.build(tenant, slug, &pointer, path, object)),
            None => Err(RegistryError::not_found(format!(
                "{} in {tenant}:{slug}",
                display_path(path)
            ))),
        }
    }

    /// Resolve a path inside a specific version of a live slug
    pub async fn resolve_version(
        &self,
        tenant: &str,
        slug: &str,
        version: u64,
        path: &str,
    ) -> Result<ResolvedContent> {
        let pointer = self.store.live_pointer(tenant, slug).await?;
        let object_key = KeyLayout::version_prefix(tenant, slug, version);

        match self.find_file(&object_key, path).await? {
            Some((path, object)) => {
                let versioned = ActivePointer {
                    object_key,
                    version,
                    ..pointer
                };
                Ok(self.build(tenant, slug, &versioned, path, object))
            }
            None => Err(RegistryError::not_found(format!(
                "{} in {tenant}:{slug}:{version}",
                display_path(path)
            ))),
        }
    }

    /// Asset request with no slug segment
    async fn resolve_asset(
        &self,
        tenant: &str,
        path: &str,
        referer: Option<&str>,
    ) -> Result<ResolvedContent> {
        let mut referer_gone = false;

        if let Some(slug) = referer.and_then(|referer| slug_from_referer(referer, tenant)) {
            debug!(tenant, %slug, path, "trying slug from referer");
            match self.resolve_in_slug(tenant, &slug, path).await {
                Ok(content) => return Ok(content),
                Err(RegistryError::NotFound(_)) => {}
                Err(RegistryError::Gone(_)) => referer_gone = true,
                Err(e) => return Err(e),
            }
        }

        let now = self.store.now_millis();
        let mut candidates: Vec<(String, ActivePointer)> = self
            .store
            .list_pointers(tenant)
            .await?
            .into_iter()
            .filter(|(_, pointer)| !pointer.is_expired(now))
            .collect();
        candidates.sort_by(|a, b| b.1.published_at.cmp(&a.1.published_at));

        for (slug, pointer) in &candidates {
            if let Some((found, object)) = self.find_file(&pointer.object_key, path).await? {
                debug!(tenant, %slug, path = %found, "asset found by pointer scan");
                return Ok(self.build(tenant, slug, pointer, found, object));
            }
        }

        if referer_gone {
            Err(RegistryError::gone(format!("{path} in {tenant}")))
        } else {
            Err(RegistryError::not_found(format!("{path} in {tenant}")))
        }
    }

    /// Look a path up inside a version: exact, directory index, then basename
    async fn find_file(
        &self,
        object_key: &str,
        path: &str,
    ) -> Result<Option<(String, StoredObject)>> {
        let path = path.trim_matches('/');
        let exact = if path.is_empty() { INDEX_HTML } else { path };

        if let Some(object) = self.store.read_file(object_key, exact).await? {
            return Ok(Some((exact.to_string(), object)));
        }

        if !path.is_empty() {
            let directory_index = format!("{path}/{INDEX_HTML}");
            if let Some(object) = self.store.read_file(object_key, &directory_index).await? {
                return Ok(Some((directory_index, object)));
            }
        }

        let wanted = basename(exact);
        let files = self.store.version_files(object_key).await?;
        if let Some(found) = files.into_iter().find(|file| basename(file) == wanted) {
            if let Some(object) = self.store.read_file(object_key, &found).await? {
                debug!(object_key, requested = exact, %found, "basename fallback");
                return Ok(Some((found, object)));
            }
        }

        Ok(None)
    }

    fn build(
        &self,
        tenant: &str,
        slug: &str,
        pointer: &ActivePointer,
        path: String,
        object: StoredObject,
    ) -> ResolvedContent {
        let content_type = object
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| content_type::from_path(&path).to_string());

        ResolvedContent {
            tenant: tenant.to_string(),
            slug: slug.to_string(),
            version: pointer.version,
            cache_control: cache_control(&path, pointer.cache_ttl),
            path,
            body: object.data,
            content_type,
            headers: pointer.headers.clone(),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { INDEX_HTML } else { path }
}
