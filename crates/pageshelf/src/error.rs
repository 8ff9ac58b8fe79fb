//! Error types for the pageshelf core
//!
//! Two families live here: [`AuthError`] for the request authenticator and
//! [`ValidationError`] for publish payloads and identifiers. Both are rejected
//! before any storage is touched.

use thiserror::Error;

/// Reasons a signed request fails verification
///
/// Every variant maps to an Unauthorized response. Malformed headers are not a
/// separate class of failure; they simply fail verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing timestamp header")]
    MissingTimestamp,

    #[error("malformed timestamp header: {0}")]
    MalformedTimestamp(String),

    #[error("timestamp outside tolerance: skew of {skew_ms}ms exceeds {tolerance_ms}ms")]
    StaleTimestamp { skew_ms: u64, tolerance_ms: u64 },

    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("signature does not match")]
    SignatureMismatch,

    #[error("signature required but no secret is configured")]
    NotConfigured,
}

impl AuthError {
    /// Short reason string suitable for an Unauthorized body
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Payload and identifier validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tenant is required")]
    MissingTenant,

    #[error("no content provided")]
    NoContent,

    #[error("invalid file path: {0}")]
    InvalidPath(String),

    #[error("invalid base64 content in {path}")]
    InvalidBase64 { path: String },

    #[error("invalid version number: {0}")]
    InvalidVersion(String),

    #[error("invalid page id: {0}")]
    InvalidPageId(String),
}
