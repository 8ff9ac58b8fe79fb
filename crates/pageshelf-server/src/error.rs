//! Error handling for the API server

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use pageshelf::AuthError;
use pageshelf_registry::RegistryError;
use serde_json::json;
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, error_message) = match &self {
            ApiError::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.reason()),
            ApiError::BadRequest(_) | ApiError::Serialization(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Registry(e) => match e {
                RegistryError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
                RegistryError::Gone(what) => (StatusCode::GONE, format!("Gone: {what}")),
                RegistryError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
                RegistryError::RateLimited { retry_after: seconds, .. } => {
                    retry_after = Some(*seconds);
                    (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string())
                }
                RegistryError::Storage(_) | RegistryError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Registry error".to_string())
                }
            },
            ApiError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),
            ApiError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let Some(seconds) = retry_after {
            body["retryAfter"] = json!(seconds);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

// Convenience functions for common errors
impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(AuthError::SignatureMismatch), StatusCode::UNAUTHORIZED),
            (ApiError::from(RegistryError::not_found("x")), StatusCode::NOT_FOUND),
            (ApiError::from(RegistryError::gone("x")), StatusCode::GONE),
            (
                ApiError::from(RegistryError::Validation(
                    pageshelf::ValidationError::MissingTenant,
                )),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::bad_request("nope"), StatusCode::BAD_REQUEST),
            (ApiError::from(AuthError::NotConfigured), StatusCode::UNAUTHORIZED),
            (
                ApiError::from(std::io::Error::other("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::from(RegistryError::RateLimited {
            retry_after: 60,
            limit: 60,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }
}
