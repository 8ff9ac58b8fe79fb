use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::content_type;
use crate::error::ValidationError;

/// Entry document every version is guaranteed to contain
pub const INDEX_HTML: &str = "index.html";

/// How a [`FileRecord`]'s `content` is carried on the wire
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Base64,
}

/// A single file inside a published version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Relative path within the version, e.g. `assets/app.css`
    pub path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub encoding: Encoding,
}

impl FileRecord {
    /// Text file with no explicit content type
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            content_type: None,
            encoding: Encoding::Utf8,
        }
    }

    /// Binary file carried as base64
    pub fn binary(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            content: BASE64.encode(bytes),
            content_type: None,
            encoding: Encoding::Base64,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Decode `content` according to `encoding`
    pub fn to_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        match self.encoding {
            Encoding::Utf8 => Ok(self.content.as_bytes().to_vec()),
            Encoding::Base64 => {
                BASE64
                    .decode(self.content.trim())
                    .map_err(|_| ValidationError::InvalidBase64 {
                        path: self.path.clone(),
                    })
            }
        }
    }

    /// Explicit content type, else one inferred from the path's extension
    pub fn resolved_content_type(&self) -> String {
        match &self.content_type {
            Some(ct) if !ct.trim().is_empty() => ct.clone(),
            _ => content_type::from_path(&self.path).to_string(),
        }
    }

    pub fn is_index(&self) -> bool {
        self.path == INDEX_HTML
    }

    /// Minimal page used when a publish carries no `index.html`
    pub fn placeholder_index() -> Self {
        Self::text(
            INDEX_HTML,
            "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Published</title></head>\
             <body><p>This page has no index document.</p></body></html>\n",
        )
        .with_content_type(content_type::HTML)
    }
}

/// Clean a relative file path inside a version
///
/// Leading slashes and backslashes are normalized away, `.` and `..` segments
/// are dropped, and empty segments collapse.
pub fn normalize_file_path(path: &str) -> Result<String, ValidationError> {
    let cleaned = path
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/");

    if cleaned.is_empty() {
        return Err(ValidationError::InvalidPath(path.to_string()));
    }

    Ok(cleaned)
}
