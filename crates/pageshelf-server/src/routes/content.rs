//! Public content serving under `/p/{tenant}/...`

use crate::{AppState, error::Result};
use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pageshelf_registry::ResolvedContent;
use tracing::{debug, warn};

/// Response header naming the version a file was served from
pub const VERSION_HEADER: &str = "x-page-version";

/// Create content routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{tenant}", get(serve_root))
        .route("/{tenant}/", get(serve_root))
        .route("/{tenant}/{*path}", get(serve_path))
}

async fn serve_root(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    serve(&state, &tenant, "", &headers).await
}

async fn serve_path(
    State(state): State<AppState>,
    Path((tenant, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    serve(&state, &tenant, &path, &headers).await
}

async fn serve(state: &AppState, tenant: &str, path: &str, headers: &HeaderMap) -> Result<Response> {
    let referer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        });

    debug!(tenant, path, referer = ?referer, "resolving content");
    let content = state
        .registry
        .resolve(tenant, path, referer.as_deref())
        .await?;
    Ok(content_response(content))
}

/// Turn resolved content into a response with its caching headers
pub fn content_response(content: ResolvedContent) -> Response {
    let mut response = (StatusCode::OK, Body::from(content.body)).into_response();
    let headers = response.headers_mut();

    for (name, value) in &content.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid pointer header"),
        }
    }

    if let Ok(value) = HeaderValue::from_str(&content.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&content.cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(VERSION_HEADER, HeaderValue::from(content.version));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_content_response_headers() {
        let response = content_response(ResolvedContent {
            tenant: "alice".into(),
            slug: "docs".into(),
            version: 42,
            path: "app.js".into(),
            body: b"1".to_vec(),
            content_type: "text/javascript; charset=utf-8".into(),
            cache_control: "public, max-age=60".into(),
            headers: BTreeMap::from([
                ("x-content-type-options".to_string(), "nosniff".to_string()),
                ("bad header".to_string(), "x".to_string()),
            ]),
        });

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/javascript; charset=utf-8");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=60");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers[VERSION_HEADER], "42");
        assert!(!headers.contains_key("bad header"));
    }
}
