//! Signed-request checks and client fingerprinting for handlers

use axum::http::{HeaderMap, Method, Uri};
use pageshelf::auth::{SIGNATURE_HEADER, SignedRequest, TIMESTAMP_HEADER, Verification};
use pageshelf_registry::ratelimit::ANONYMOUS_FINGERPRINT;
use tracing::debug;

use crate::AppState;
use crate::error::Result;

/// Verify the signature headers against the raw request body
///
/// Handlers receive the body as bytes, verify, and only then parse it, so the
/// bytes that were signed are exactly the bytes that get deserialized.
pub fn authorize(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Verification> {
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());

    let request = SignedRequest {
        method: method.as_str(),
        path_and_query,
        timestamp: header_str(headers, TIMESTAMP_HEADER),
        signature: header_str(headers, SIGNATURE_HEADER),
        body,
    };

    state.authenticator.verify(&request).map_err(|e| {
        debug!(path = path_and_query, reason = %e, "rejected unsigned or badly signed request");
        e.into()
    })
}

/// Rate-limit bucket for a caller
///
/// First `X-Forwarded-For` entry, else `X-Real-IP`, else anonymous.
pub fn client_fingerprint(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            header_str(headers, "x-real-ip")
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .unwrap_or(ANONYMOUS_FINGERPRINT)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
