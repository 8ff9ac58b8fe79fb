//! Publish coordination: validate a payload, write its files, flip the pointer

use pageshelf::content_type;
use pageshelf::file::normalize_file_path;
use pageshelf::naming::{normalize_tenant, sanitize_slug, serving_url};
use pageshelf::rewrite::relativize_asset_urls;
use pageshelf::{Encoding, FileRecord, INDEX_HTML, PageId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::address::KeyLayout;
use crate::error::Result;
use crate::pointer::{ActivePointer, DEFAULT_CACHE_TTL, expiry_at};
use crate::versions::VersionStore;

/// Multi-file publish payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default, rename = "htmlTTL")]
    pub html_ttl: Option<u64>,
    #[serde(default)]
    pub delete_after_seconds: Option<u64>,
}

/// Single-document publish payload, wrapped into an `index.html` file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleHtmlRequest {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub html_base64: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, rename = "htmlTTL")]
    pub html_ttl: Option<u64>,
    #[serde(default)]
    pub delete_after_seconds: Option<u64>,
}

impl SingleHtmlRequest {
    /// Convert into a regular publish with one `index.html` file
    ///
    /// `html` wins over `htmlBase64` when both are present.
    pub fn into_publish_request(self) -> std::result::Result<PublishRequest, ValidationError> {
        let mut file = match (self.html, self.html_base64) {
            (Some(html), _) if !html.is_empty() => FileRecord::text(INDEX_HTML, html),
            (_, Some(encoded)) if !encoded.trim().is_empty() => FileRecord {
                path: INDEX_HTML.to_string(),
                content: encoded,
                content_type: None,
                encoding: Encoding::Base64,
            },
            _ => return Err(ValidationError::NoContent),
        };
        file.content_type = Some(self.content_type.unwrap_or_else(|| content_type::HTML.into()));

        Ok(PublishRequest {
            tenant: self.tenant,
            slug: self.slug,
            files: vec![file],
            html_ttl: self.html_ttl,
            delete_after_seconds: self.delete_after_seconds,
        })
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// `tenant:slug:version`
    pub page_id: String,
    pub url: String,
    pub version: u64,
    pub pointer: ActivePointer,
}

/// Hands out strictly increasing version numbers
///
/// Versions are wall-clock milliseconds. Two publishes landing in the same
/// millisecond get consecutive numbers instead of sharing one.
#[derive(Debug, Default)]
pub struct VersionSequence {
    last: AtomicU64,
}

impl VersionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next version at or after `floor`, strictly above any handed out before
    pub fn next(&self, floor: u64) -> u64 {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = floor.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

/// A file that passed validation, ready to be written
#[derive(Debug)]
struct PreparedFile {
    data: Vec<u8>,
    content_type: String,
}

pub struct Publisher {
    store: Arc<VersionStore>,
    sequence: VersionSequence,
}

impl Publisher {
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self {
            store,
            sequence: VersionSequence::new(),
        }
    }

    /// Publish a new version and make it the active one
    ///
    /// Every file is validated and decoded before anything is written. Files
    /// are written before the pointer, so a failed write returns an error with
    /// the previous version still active.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt> {
        let tenant = normalize_tenant(&request.tenant)?;
        let slug = sanitize_slug(request.slug.as_deref());
        let files = prepare_files(&request.files)?;

        let now = self.store.now_millis();
        let floor = match self.store.get_pointer(&tenant, &slug).await? {
            Some(existing) => now.max(existing.version.saturating_add(1)),
            None => now,
        };
        let version = self.sequence.next(floor);
        let object_key = KeyLayout::version_prefix(&tenant, &slug, version);

        debug!(%tenant, %slug, version, files = files.len(), "writing version files");
        let total = files.len();
        for (written, (path, file)) in files.into_iter().enumerate() {
            if let Err(e) = self
                .store
                .write_file(&object_key, &path, file.data, &file.content_type)
                .await
            {
                warn!(
                    %object_key,
                    %path,
                    written,
                    total,
                    error = %e,
                    "publish aborted; files already written are orphaned"
                );
                return Err(e);
            }
        }

        let pointer = ActivePointer {
            object_key,
            version,
            cache_ttl: request.html_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            published_at: now,
            expires_at: Some(expiry_at(now, request.delete_after_seconds)),
            headers: ActivePointer::default_headers(),
        };
        self.store.put_pointer(&tenant, &slug, &pointer).await?;

        info!(%tenant, %slug, version, expires_at = ?pointer.expires_at, "published");

        Ok(PublishReceipt {
            page_id: PageId::new(tenant.as_str(), slug.as_str(), Some(version)).to_string(),
            url: serving_url(&tenant, &slug),
            version,
            pointer,
        })
    }

    /// Publish a single HTML document as the slug's `index.html`
    pub async fn publish_single_html(&self, request: SingleHtmlRequest) -> Result<PublishReceipt> {
        let request = request.into_publish_request()?;
        self.publish(request).await
    }
}

/// Validate, decode and dedupe a publish's files
///
/// Later entries with the same normalized path replace earlier ones. A
/// placeholder `index.html` is added when none is present, and the entry
/// document's root-relative asset URLs are made relative.
fn prepare_files(
    files: &[FileRecord],
) -> std::result::Result<BTreeMap<String, PreparedFile>, ValidationError> {
    if files.is_empty() {
        return Err(ValidationError::NoContent);
    }

    let mut prepared = BTreeMap::new();
    for file in files {
        let path = normalize_file_path(&file.path)?;
        let data = file.to_bytes()?;
        let content_type = match &file.content_type {
            Some(ct) if !ct.trim().is_empty() => ct.clone(),
            _ => content_type::from_path(&path).to_string(),
        };
        prepared.insert(path, PreparedFile { data, content_type });
    }

    if !prepared.contains_key(INDEX_HTML) {
        let placeholder = FileRecord::placeholder_index();
        prepared.insert(
            INDEX_HTML.to_string(),
            PreparedFile {
                data: placeholder.to_bytes()?,
                content_type: placeholder.resolved_content_type(),
            },
        );
    }

    if let Some(index) = prepared.get_mut(INDEX_HTML) {
        if let Ok(html) = std::str::from_utf8(&index.data) {
            index.data = relativize_asset_urls(html).into_bytes();
        }
    }

    Ok(prepared)
}
