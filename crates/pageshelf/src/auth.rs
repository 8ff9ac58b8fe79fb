//! Request authentication for mutating operations
//!
//! A client signs every publish or rollback with HMAC-SHA256 over a canonical
//! string:
//!
//! ```text
//! METHOD "\n"
//! PATH_AND_QUERY "\n"
//! TIMESTAMP "\n"
//! HEX(SHA256(BODY))
//! ```
//!
//! The timestamp (epoch milliseconds, 10 to 16 digits) travels in
//! [`TIMESTAMP_HEADER`], the signature in [`SIGNATURE_HEADER`] as `v1=<hex>`,
//! `sha256=<hex>` or bare `<hex>`. Any of the configured secrets may have
//! produced the signature, which allows rotating secrets without downtime.
//!
//! When no secret is configured the authenticator does not enforce anything,
//! unless it was built with [`Authenticator::require_signature`], in which
//! case every request fails with [`AuthError::NotConfigured`].
//!
//! There is no nonce cache: a captured request can be replayed until its
//! timestamp leaves the tolerance window.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Default allowed clock skew between client and server
pub const DEFAULT_TOLERANCE_MS: u64 = 300_000;

const SHA256_HEX_LEN: usize = 64;

/// Rotation list of shared secrets
#[derive(Clone, Default)]
pub struct SecretSet {
    secrets: Vec<String>,
}

impl SecretSet {
    /// Parse a comma-separated list, ignoring blank entries
    pub fn from_csv(csv: &str) -> Self {
        Self {
            secrets: csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        self.secrets.iter().map(String::as_str)
    }
}

impl std::fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSet")
            .field("count", &self.secrets.len())
            .finish()
    }
}

/// The parts of an inbound request that take part in verification
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub path_and_query: &'a str,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

/// Successful verification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// A configured secret produced the signature
    Verified,
    /// No secret is configured; the request was not checked
    Bypassed,
}

/// HMAC request verifier
pub struct Authenticator {
    secrets: SecretSet,
    tolerance_ms: u64,
    require_signature: bool,
    clock: SharedClock,
}

impl Authenticator {
    pub fn new(secrets: SecretSet, tolerance_ms: u64, clock: SharedClock) -> Self {
        if secrets.is_empty() {
            warn!("no publish secret configured: signed-request authentication is NOT enforced");
        }

        Self {
            secrets,
            tolerance_ms,
            require_signature: false,
            clock,
        }
    }

    /// Reject every request when no secret is configured instead of bypassing
    pub fn require_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Whether unsigned requests are turned away
    pub fn is_enforced(&self) -> bool {
        self.require_signature || !self.secrets.is_empty()
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    /// Verify a request's timestamp freshness and signature
    pub fn verify(&self, request: &SignedRequest<'_>) -> Result<Verification, AuthError> {
        if self.secrets.is_empty() {
            if self.require_signature {
                warn!(path = request.path_and_query, "signature required but no secret configured");
                return Err(AuthError::NotConfigured);
            }
            debug!(path = request.path_and_query, "authentication bypassed");
            return Ok(Verification::Bypassed);
        }

        let timestamp = request
            .timestamp
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTimestamp)?;
        let issued_at = parse_timestamp(timestamp)?;

        let now = self.clock.now_millis();
        let skew_ms = now.abs_diff(issued_at);
        if skew_ms > self.tolerance_ms {
            return Err(AuthError::StaleTimestamp {
                skew_ms,
                tolerance_ms: self.tolerance_ms,
            });
        }

        let header = request
            .signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingSignature)?;
        let provided = parse_signature(header).ok_or(AuthError::MalformedSignature)?;

        let canonical = canonical_string(
            request.method,
            request.path_and_query,
            timestamp,
            request.body,
        );

        for secret in self.secrets.iter() {
            let expected = hmac_sha256(secret, &canonical);
            if bool::from(provided.as_slice().ct_eq(expected.as_slice())) {
                debug!(path = request.path_and_query, "signature verified");
                return Ok(Verification::Verified);
            }
        }

        debug!(
            path = request.path_and_query,
            secrets = self.secrets.len(),
            "signature mismatch"
        );
        Err(AuthError::SignatureMismatch)
    }
}

/// Lowercase hex SHA-256 of the request body
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Build the string that gets signed
pub fn canonical_string(method: &str, path_and_query: &str, timestamp: &str, body: &[u8]) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path_and_query,
        timestamp,
        body_hash(body)
    )
}

/// Produce the `v1=<hex>` signature header value for a request
pub fn sign(secret: &str, method: &str, path_and_query: &str, timestamp: &str, body: &[u8]) -> String {
    let canonical = canonical_string(method, path_and_query, timestamp, body);
    format!("v1={}", hex::encode(hmac_sha256(secret, &canonical)))
}

fn hmac_sha256(secret: &str, message: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can accept any key length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Parse a timestamp header of 10 to 16 ASCII digits
fn parse_timestamp(value: &str) -> Result<u64, AuthError> {
    let well_formed =
        (10..=16).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(AuthError::MalformedTimestamp(value.to_string()));
    }

    value
        .parse::<u64>()
        .map_err(|_| AuthError::MalformedTimestamp(value.to_string()))
}

/// Extract signature bytes from a possibly comma-joined header
///
/// Each segment may be `v1=<hex>`, `sha256=<hex>` or bare `<hex>`; the first
/// segment carrying a well-formed SHA-256 hex digest wins. Hex case is ignored.
fn parse_signature(header: &str) -> Option<Vec<u8>> {
    header.split(',').map(str::trim).find_map(|segment| {
        let digest = segment
            .strip_prefix("v1=")
            .or_else(|| segment.strip_prefix("sha256="))
            .unwrap_or(segment);

        if digest.len() != SHA256_HEX_LEN {
            return None;
        }
        hex::decode(digest).ok()
    })
}
