//! Stored responses and the rules for what may be stored.

use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};

pub const X_PROXY_CACHE: &str = "x-proxy-cache";

/// How a cacheable request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a live entry; no backend contact.
    Hit,
    /// Served from an upstream fetch, possibly shared with concurrent callers.
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A fully buffered upstream response. Never mutated once shared.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
            ttl: Duration::ZERO,
        }
    }

    /// Stamp the entry as stored now, live for `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.stored_at = Instant::now();
        self.ttl = ttl;
        self
    }

    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }

    /// Whether the response may be kept for later requests.
    ///
    /// Mirrors a shared HTTP cache: only 200/203/301/302, nothing that sets
    /// cookies, nothing the backend marked private or uncacheable.
    pub fn is_storable(&self) -> bool {
        let status_ok = matches!(self.status.as_u16(), 200 | 203 | 301 | 302);
        if !status_ok || self.headers.contains_key(header::SET_COOKIE) {
            return false;
        }
        !self
            .headers
            .get_all(header::CACHE_CONTROL)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(|directive| directive.trim().to_ascii_lowercase())
            .any(|directive| {
                matches!(directive.as_str(), "no-store" | "no-cache" | "private" | "max-age=0")
            })
    }

    /// Materialize a client response tagged with the cache status.
    pub fn to_response(&self, status: CacheStatus) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
            .headers_mut()
            .insert(X_PROXY_CACHE, HeaderValue::from_static(status.as_str()));
        response
    }
}
