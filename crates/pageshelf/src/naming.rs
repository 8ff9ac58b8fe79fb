//! Tenant, slug and page-id normalization

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Slug used when a request names none
pub const DEFAULT_SLUG: &str = "index";

/// First-level directories that always name an asset, never a slug
pub const ASSET_DIRECTORIES: [&str; 7] = ["assets", "static", "css", "js", "img", "images", "media"];

/// Suffix appended to a slug that collides with [`ASSET_DIRECTORIES`]
const RESERVED_SLUG_SUFFIX: &str = "-page";

/// Lowercase and trim a tenant identifier
///
/// Tenants prefix every storage key, so separators used by the key layout
/// (`/` and `:`) are rejected.
pub fn normalize_tenant(tenant: &str) -> Result<String, ValidationError> {
    let tenant = tenant.trim().to_lowercase();
    if tenant.is_empty() || tenant.contains('/') || tenant.contains(':') {
        return Err(ValidationError::MissingTenant);
    }
    Ok(tenant)
}

/// Sanitize a slug so it cannot escape its tenant's namespace
///
/// Leading and trailing slashes are stripped, `.` and `..` segments removed,
/// remaining inner separators and dots folded into `-` so the slug stays a
/// single path segment that the content router reads as a slug. A slug equal
/// to one of the [`ASSET_DIRECTORIES`] gets a `-page` suffix. An empty result
/// becomes [`DEFAULT_SLUG`].
pub fn sanitize_slug(slug: Option<&str>) -> String {
    let Some(slug) = slug else {
        return DEFAULT_SLUG.to_string();
    };

    let cleaned = slug
        .trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("-")
        .replace([':', '.'], "-");

    if cleaned.is_empty() {
        DEFAULT_SLUG.to_string()
    } else if ASSET_DIRECTORIES.contains(&cleaned.as_str()) {
        cleaned + RESERVED_SLUG_SUFFIX
    } else {
        cleaned
    }
}

/// Public path a slug is served under
pub fn serving_url(tenant: &str, slug: &str) -> String {
    if slug == DEFAULT_SLUG {
        format!("/p/{tenant}/")
    } else {
        format!("/p/{tenant}/{slug}")
    }
}

/// Identifier for a published page: `tenant:slug` or `tenant:slug:version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageId {
    pub tenant: String,
    pub slug: String,
    pub version: Option<u64>,
}

impl PageId {
    pub fn new(tenant: impl Into<String>, slug: impl Into<String>, version: Option<u64>) -> Self {
        Self {
            tenant: tenant.into(),
            slug: slug.into(),
            version,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}:{}:{}", self.tenant, self.slug, version),
            None => write!(f, "{}:{}", self.tenant, self.slug),
        }
    }
}

impl FromStr for PageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidPageId(s.to_string());

        let (tenant, rest) = s.split_once(':').ok_or_else(invalid)?;
        let tenant = normalize_tenant(tenant).map_err(|_| invalid())?;

        let (slug, version) = match rest.split_once(':') {
            Some((slug, version)) => {
                let version = version
                    .parse::<u64>()
                    .map_err(|_| ValidationError::InvalidVersion(version.to_string()))?;
                (slug, Some(version))
            }
            None => (rest, None),
        };

        Ok(Self {
            tenant,
            slug: sanitize_slug(Some(slug)),
            version,
        })
    }
}
