//! Signed mutation routes: publish and rollback

use crate::{
    AppState,
    auth::{authorize, client_fingerprint},
    error::{ApiError, Result},
    models::{ApiResponse, RollbackRequest, RollbackResponse},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use pageshelf::PageId;
use pageshelf::naming::{normalize_tenant, sanitize_slug, serving_url};
use pageshelf_registry::{PublishRequest, RateLimitStatus, RegistryError, SingleHtmlRequest};
use serde::de::DeserializeOwned;
use tracing::info;

/// Create mutation routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish))
        .route("/publish/html", post(publish_html))
        .route("/rollback", post(rollback))
}

/// Publish a multi-file version
async fn publish(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    authorize(&state, &method, &uri, &headers, &body)?;
    let status = state
        .registry
        .admit("publish", &client_fingerprint(&headers))
        .await?;

    let request: PublishRequest = parse_body(&body)?;
    let receipt = state.registry.publish(request).await?;

    Ok(with_rate_limit_headers(
        (
            StatusCode::CREATED,
            Json(ApiResponse::with_message(receipt, "Page published")),
        )
            .into_response(),
        &status,
    ))
}

/// Publish a single HTML document
async fn publish_html(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    authorize(&state, &method, &uri, &headers, &body)?;
    let status = state
        .registry
        .admit("publish-html", &client_fingerprint(&headers))
        .await?;

    let request: SingleHtmlRequest = parse_body(&body)?;
    let receipt = state.registry.publish_single_html(request).await?;

    Ok(with_rate_limit_headers(
        (
            StatusCode::CREATED,
            Json(ApiResponse::with_message(receipt, "Page published")),
        )
            .into_response(),
        &status,
    ))
}

/// Point a slug back at an earlier version
async fn rollback(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<RollbackResponse>>> {
    authorize(&state, &method, &uri, &headers, &body)?;

    let request: RollbackRequest = parse_body(&body)?;
    let tenant = normalize_tenant(&request.tenant).map_err(RegistryError::from)?;
    let slug = sanitize_slug(request.slug.as_deref());
    let version = request
        .version
        .to_version()
        .map_err(RegistryError::from)?;

    let pointer = state.registry.rollback(&tenant, &slug, version).await?;
    info!(%tenant, %slug, version, "rollback via api");

    Ok(Json(ApiResponse::with_message(
        RollbackResponse {
            page_id: PageId::new(tenant.as_str(), slug.as_str(), Some(version)).to_string(),
            url: serving_url(&tenant, &slug),
            pointer,
        },
        "Rolled back",
    )))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("request body is empty"));
    }
    Ok(serde_json::from_slice(body)?)
}

fn with_rate_limit_headers(mut response: Response, status: &RateLimitStatus) -> Response {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(status.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(status.reset_after));
    response
}
