//! Cache key derivation.

use crate::config::Scheme;

/// Identity of a cached response: scheme, host, path and query.
///
/// The scheme is part of the key so a response fetched for one scheme is
/// never served to the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scheme: Scheme,
    host: String,
    path: String,
    query: Option<String>,
}

impl CacheKey {
    /// `host` must be normalized; `path` and `query` are taken as received.
    pub fn new(scheme: Scheme, host: &str, path: &str, query: Option<&str>) -> Self {
        Self {
            scheme,
            host: host.to_string(),
            path: path.to_string(),
            query: query.map(str::to_string),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}
