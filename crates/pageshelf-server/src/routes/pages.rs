//! Read-only page routes: version listings and content by page id

use crate::{
    AppState,
    auth::authorize,
    error::Result,
    models::{ApiResponse, VersionsResponse},
    routes::content::content_response,
};
use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method},
    response::Response,
    routing::get,
};
use pageshelf::naming::{normalize_tenant, sanitize_slug};
use pageshelf_registry::RegistryError;
use tracing::debug;

/// Create page routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/versions/{tenant}/{slug}", get(list_versions))
        .route("/pages/{page_id}", get(get_content))
}

/// List a slug's versions, newest first
async fn list_versions(
    State(state): State<AppState>,
    Path((tenant, slug)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<VersionsResponse>>> {
    if state.config.protect_version_listing {
        authorize(&state, &method, &uri, &headers, &[])?;
    }

    let tenant = normalize_tenant(&tenant).map_err(RegistryError::from)?;
    let slug = sanitize_slug(Some(slug.as_str()));
    debug!(%tenant, %slug, "listing versions");

    let versions = state.registry.list_versions(&tenant, &slug).await?;
    Ok(Json(ApiResponse::new(VersionsResponse {
        tenant,
        slug,
        versions,
    })))
}

/// Entry document of `tenant:slug` or `tenant:slug:version`
async fn get_content(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Response> {
    let content = state.registry.get_content(&page_id).await?;
    Ok(content_response(content))
}
