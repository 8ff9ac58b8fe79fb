//! Server configuration management

use crate::error::{ApiError, Result};
use pageshelf::auth::DEFAULT_TOLERANCE_MS;
use std::str::FromStr;

/// Where pointers and version files are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory; everything is lost on restart
    Memory,
    /// S3-compatible object storage plus Redis
    S3,
}

impl FromStr for StorageBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3),
            other => Err(ApiError::Config(format!(
                "Invalid STORAGE_BACKEND value: {other}"
            ))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Comma-separated HMAC secrets; empty disables authentication
    pub publish_secret: String,

    /// Reject mutations instead of bypassing auth when no secret is set
    pub require_signature: bool,

    /// Allowed distance between a request's timestamp and now
    pub signature_tolerance_ms: u64,

    pub rate_limit_window_seconds: u64,

    pub rate_limit_max: u64,

    /// Require a signature on version listings
    pub protect_version_listing: bool,

    pub storage_backend: StorageBackend,

    pub redis_url: Option<String>,

    pub max_body_bytes: usize,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", "3000")?,
            publish_secret: std::env::var("PUBLISH_SECRET").unwrap_or_default(),
            require_signature: std::env::var("REQUIRE_SIGNATURE")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            signature_tolerance_ms: parse_var(
                "SIGNATURE_TOLERANCE_MS",
                &DEFAULT_TOLERANCE_MS.to_string(),
            )?,
            rate_limit_window_seconds: parse_var("RATE_LIMIT_WINDOW_SECONDS", "60")?,
            rate_limit_max: parse_var("RATE_LIMIT_MAX", "60")?,
            protect_version_listing: std::env::var("PROTECT_VERSION_LISTING")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
            storage_backend: std::env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            max_body_bytes: parse_var("MAX_BODY_BYTES", "26214400")?,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ApiError::Config(format!("Invalid {name} value")))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            publish_secret: String::new(),
            require_signature: false,
            signature_tolerance_ms: DEFAULT_TOLERANCE_MS,
            rate_limit_window_seconds: 60,
            rate_limit_max: 60,
            protect_version_listing: false,
            storage_backend: StorageBackend::Memory,
            redis_url: None,
            max_body_bytes: 25 * 1024 * 1024,
            cors_origins: vec!["*".to_string()],
        }
    }
}
