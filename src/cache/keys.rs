//! Cache key construction.
//!
//! Keys follow the grammar `<normalized-uri>["?"<raw-query>]["+"<identity>]`.
//! Keyspace prefixes are the normalized uri alone and address every key a
//! resource can produce, whatever its query or identity suffix.

use std::fmt;

use tracing::warn;

use super::policy::ResourceCachePolicy;

pub const QUERY_SEPARATOR: char = '?';
pub const IDENTITY_SEPARATOR: char = '+';

/// Canonical key addressing a single cached response body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized uri shared by every key of one concrete resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn for_uri(uri: &str) -> Self {
        Self(normalize_uri(uri).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `key` was produced for this resource.
    ///
    /// A plain `starts_with` would also match sibling resources such as
    /// `/v1/posts/search` under `/v1/posts`, so the remainder must be empty
    /// or begin with one of the key separators.
    pub fn covers(&self, key: &str) -> bool {
        match key.strip_prefix(self.0.as_str()) {
            Some(rest) => {
                rest.is_empty()
                    || rest.starts_with(QUERY_SEPARATOR)
                    || rest.starts_with(IDENTITY_SEPARATOR)
            }
            None => false,
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip a single trailing `/` so `/v1/posts/` and `/v1/posts` collide.
pub fn normalize_uri(uri: &str) -> &str {
    uri.strip_suffix('/').unwrap_or(uri)
}

/// Build the cache key for a request against `policy`.
///
/// When the policy is per-identity but no identity is known the key degrades
/// to the shared form. Such entries must not be reused across identities.
pub fn build_key(
    uri: &str,
    policy: &ResourceCachePolicy,
    query: Option<&str>,
    identity: Option<&str>,
) -> CacheKey {
    let mut key = String::from(normalize_uri(uri));

    if policy.includes_query() {
        key.push(QUERY_SEPARATOR);
        key.push_str(query.unwrap_or(""));
    }

    if policy.per_identity() {
        match identity {
            Some(id) => {
                key.push(IDENTITY_SEPARATOR);
                key.push_str(id);
            }
            None => {
                warn!(
                    target = "quire::cache::keys",
                    resource = policy.name(),
                    uri,
                    "per-identity cache key built without identity; entry is shared"
                );
            }
        }
    }

    CacheKey(key)
}
