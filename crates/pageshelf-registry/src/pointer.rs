use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cache lifetime for non-entry assets when a publish names none
pub const DEFAULT_CACHE_TTL: u64 = 60;

/// Bounds applied to a publish's `deleteAfterSeconds`
pub const MIN_DELETE_AFTER_SECONDS: u64 = 600;
pub const MAX_DELETE_AFTER_SECONDS: u64 = 7_776_000;

/// Lifetime of a pointer whose publish named no `deleteAfterSeconds`
pub const DEFAULT_DELETE_AFTER_SECONDS: u64 = MAX_DELETE_AFTER_SECONDS;

/// Record selecting which version of a tenant/slug is served
///
/// Stored as JSON under `pages:{tenant}:{slug}`. Publishing and rolling back
/// overwrite it wholesale; the last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivePointer {
    /// Version prefix, e.g. `alice/docs/1700000000000/`
    pub object_key: String,
    pub version: u64,
    #[serde(rename = "cacheTTL")]
    pub cache_ttl: u64,
    /// Epoch milliseconds
    pub published_at: u64,
    /// Epoch milliseconds after which the page reads as gone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ActivePointer {
    /// Whether the pointer's expiry has passed at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now_ms > expires_at)
    }

    /// Headers attached to every response served from a pointer
    pub fn default_headers() -> BTreeMap<String, String> {
        BTreeMap::from([("x-content-type-options".to_string(), "nosniff".to_string())])
    }
}

/// Clamp a requested lifetime into the supported range
pub fn clamp_delete_after(seconds: u64) -> u64 {
    seconds.clamp(MIN_DELETE_AFTER_SECONDS, MAX_DELETE_AFTER_SECONDS)
}

/// Expiry in epoch milliseconds for a pointer written at `now_ms`
pub fn expiry_at(now_ms: u64, delete_after_seconds: Option<u64>) -> u64 {
    let seconds = delete_after_seconds.map_or(DEFAULT_DELETE_AFTER_SECONDS, clamp_delete_after);
    now_ms.saturating_add(seconds * 1000)
}
