/// Storage key layout for pointers, version files and counters
pub struct KeyLayout;

impl KeyLayout {
    /// Key of the active pointer for a tenant/slug
    /// Example: "pages:alice:docs"
    pub fn pointer_key(tenant: &str, slug: &str) -> String {
        format!("pages:{}:{}", tenant, slug)
    }

    /// Prefix shared by every pointer of a tenant
    /// Example: "pages:alice:"
    pub fn pointer_prefix(tenant: &str) -> String {
        format!("pages:{}:", tenant)
    }

    /// Recover the slug from a pointer key
    pub fn slug_from_pointer_key<'a>(tenant: &str, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&Self::pointer_prefix(tenant))
            .filter(|slug| !slug.is_empty())
    }

    /// Prefix under which every version of a slug lives
    /// Example: "alice/docs/"
    pub fn slug_prefix(tenant: &str, slug: &str) -> String {
        format!("{}/{}/", tenant, slug)
    }

    /// Object prefix of one version
    /// Example: "alice/docs/1700000000000/"
    pub fn version_prefix(tenant: &str, slug: &str, version: u64) -> String {
        format!("{}/{}/{}/", tenant, slug, version)
    }

    /// Blob key of a file inside a version prefix
    /// Example: "alice/docs/1700000000000/assets/app.css"
    pub fn file_key(object_key: &str, path: &str) -> String {
        format!("{}{}", object_key, path)
    }

    /// Parse the version segment of a blob key listed under `slug_prefix`
    ///
    /// Returns `None` for keys outside the prefix or whose version segment is
    /// not a number.
    pub fn parse_version(slug_prefix: &str, key: &str) -> Option<u64> {
        let rest = key.strip_prefix(slug_prefix)?;
        let (segment, _) = rest.split_once('/')?;
        segment.parse().ok()
    }

    /// Rate-limit counter for one endpoint, caller and window
    /// Example: "ratelimit:publish:203.0.113.7:28333333"
    pub fn rate_limit_key(endpoint: &str, fingerprint: &str, window_index: u64) -> String {
        format!("ratelimit:{}:{}:{}", endpoint, fingerprint, window_index)
    }
}
