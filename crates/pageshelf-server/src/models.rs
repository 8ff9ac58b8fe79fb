//! API models for requests and responses

use pageshelf::ValidationError;
use pageshelf_registry::{ActivePointer, VersionEntry};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Version number as a JSON number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VersionParam {
    Number(u64),
    Text(String),
}

impl VersionParam {
    pub fn to_version(&self) -> Result<u64, ValidationError> {
        match self {
            Self::Number(version) => Ok(*version),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidVersion(text.clone())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub version: VersionParam,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    pub page_id: String,
    pub url: String,
    pub pointer: ActivePointer,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub tenant: String,
    pub slug: String,
    pub versions: Vec<VersionEntry>,
}
